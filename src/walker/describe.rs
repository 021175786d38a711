//! Human-readable description of a walker tree (debug output)

use serde_json::{json, Value};

use super::session::DiscoverySession;
use super::{FieldWalker, Resolution, WalkerKind};

impl DiscoverySession {
    /// Describes one walker without following record members.
    pub fn describe(&self, walker: &FieldWalker) -> Value {
        let mut out = json!({
            "name": walker.field_name,
            "type": walker.type_name,
        });
        let (label, extra) = match &walker.kind {
            WalkerKind::Primitive(kind) => ("primitive", json!({"avro": kind.avro_type()})),
            WalkerKind::String(_) => ("string", json!({})),
            WalkerKind::Record(id) => ("record", json!({"record": self.record(*id).full_name()})),
            WalkerKind::Pointer(pointer) => (
                "pointer",
                json!({
                    "resolved": pointer.state == Resolution::Resolved,
                    "target": self.describe(&pointer.target),
                }),
            ),
            WalkerKind::BackRef { target } => (
                "reference",
                json!({"target": target.map(|id| self.record(id).class_name.clone())}),
            ),
            WalkerKind::Vector(inner) => ("vector", json!({"items": self.describe(inner)})),
            WalkerKind::BitVector => ("bits", json!({})),
            WalkerKind::Array(inner, n) => (
                "array",
                json!({"length": n, "items": self.describe(inner)}),
            ),
            WalkerKind::Dynamic { form, target } => (
                "dynamic",
                json!({
                    "form": form.type_name(),
                    "target": target.map(|id| self.record(id).class_name.clone()),
                }),
            ),
        };
        out["walker"] = json!(label);
        if let (Some(out), Value::Object(extra)) = (out.as_object_mut(), extra) {
            out.extend(extra);
        }
        out
    }

    /// Every record walker built in this session, in build order.
    pub fn describe_records(&self) -> Value {
        Value::Array(
            self.records()
                .iter()
                .map(|record| {
                    json!({
                        "class": record.class_name,
                        "schema_name": record.full_name(),
                        "size": record.size,
                        "members": record
                            .members
                            .iter()
                            .map(|m| json!({
                                "name": m.walker.field_name,
                                "type": m.walker.type_name,
                                "offset": m.offset,
                            }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect(),
        )
    }
}
