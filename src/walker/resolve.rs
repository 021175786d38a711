//! Resolution against live records
//!
//! `Unresolved -> Resolved` is monotonic. A null live value leaves the state
//! alone. Resolved walkers still descend so nested lazily typed fields can be
//! pinned by later samples. A live object of another class than the pinned
//! one is not sampled; emission rejects it.

use std::collections::HashSet;

use super::session::{DiscoverySession, RecordId};
use super::typename::DynamicForm;
use super::{FieldWalker, Resolution, WalkerKind};
use crate::dictionary::normalize_type_name;
use crate::errors::{WalkError, WalkResult};
use crate::memory::{Address, Memory};

/// Record instances already visited in one resolve pass
pub(crate) type Visiting = HashSet<(RecordId, Address)>;

impl DiscoverySession {
    /// Resolves `walker` against the live value at `addr`.
    ///
    /// Passes repeat until one pins nothing new.
    pub fn resolve(
        &mut self,
        walker: &mut FieldWalker,
        mem: &dyn Memory,
        addr: Address,
    ) -> WalkResult<()> {
        loop {
            let pinned = self.pinned;
            self.resolve_field(walker, mem, addr, &mut Visiting::new())?;
            if self.pinned == pinned {
                return Ok(());
            }
        }
    }

    /// False when the live object at `addr` is of another class than `id`.
    pub(crate) fn runtime_matches(&self, id: RecordId, mem: &dyn Memory, addr: Address) -> bool {
        match mem.runtime_type(addr).map(normalize_type_name) {
            Some(actual) => actual == self.record(id).class_name,
            None => true,
        }
    }

    pub(crate) fn resolve_field(
        &mut self,
        walker: &mut FieldWalker,
        mem: &dyn Memory,
        addr: Address,
        visiting: &mut Visiting,
    ) -> WalkResult<()> {
        let field_name = walker.field_name.clone();
        match &mut walker.kind {
            WalkerKind::Primitive(_) | WalkerKind::String(_) | WalkerKind::BitVector => Ok(()),

            WalkerKind::Record(id) => self.resolve_record(*id, mem, addr, visiting),

            WalkerKind::Pointer(pointer) => {
                let target_addr = mem.read_address(addr)?;
                if target_addr.is_null() {
                    return Ok(());
                }
                if pointer.state == Resolution::Unresolved {
                    if let WalkerKind::Record(declared) = pointer.target.kind {
                        if let Some(runtime) = mem.runtime_type(target_addr) {
                            let runtime = normalize_type_name(runtime);
                            if runtime != self.record(declared).class_name {
                                let id = self.record_for(runtime)?;
                                pointer.target =
                                    FieldWalker::new(field_name, runtime, WalkerKind::Record(id));
                            }
                        }
                    }
                    pointer.state = Resolution::Resolved;
                    self.pinned += 1;
                } else if let WalkerKind::Record(id) = pointer.target.kind {
                    if !self.runtime_matches(id, mem, target_addr) {
                        return Ok(());
                    }
                }
                self.resolve_field(&mut pointer.target, mem, target_addr, visiting)
            }

            WalkerKind::BackRef { target } => {
                let uid = mem.read_u32(addr)?;
                let Some(target_addr) = resolve_uid(mem, uid) else {
                    return Ok(());
                };
                let id = match *target {
                    Some(id) => {
                        if !self.runtime_matches(id, mem, target_addr) {
                            return Ok(());
                        }
                        id
                    }
                    None => match mem.runtime_type(target_addr) {
                        Some(runtime) => {
                            let id = self.record_for(runtime)?;
                            *target = Some(id);
                            self.pinned += 1;
                            id
                        }
                        None => return Ok(()),
                    },
                };
                self.resolve_record(id, mem, target_addr, visiting)
            }

            WalkerKind::Vector(inner) => {
                if self.is_resolved(inner) {
                    return Ok(());
                }
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                let stride = inner.size(self);
                for i in 0..len {
                    self.resolve_field(inner, mem, data.offset(i * stride), visiting)?;
                }
                Ok(())
            }

            WalkerKind::Array(inner, n) => {
                if self.is_resolved(inner) {
                    return Ok(());
                }
                let stride = inner.size(self);
                for i in 0..*n {
                    self.resolve_field(inner, mem, addr.offset(i * stride), visiting)?;
                }
                Ok(())
            }

            WalkerKind::Dynamic { form, target } => {
                let data = mem.read_address(addr)?;
                let len = mem.read_u64(addr.offset(8))? as usize;
                for i in 0..len {
                    let Some(element) = dynamic_element(mem, *form, data, i)? else {
                        continue;
                    };
                    let Some(runtime) = mem.runtime_type(element) else {
                        continue;
                    };
                    let runtime = normalize_type_name(runtime);
                    let id = match *target {
                        Some(id) => {
                            let expected = &self.record(id).class_name;
                            if expected != runtime {
                                return Err(WalkError::element_type_mismatch(
                                    field_name.as_str(),
                                    expected.as_str(),
                                    runtime,
                                ));
                            }
                            id
                        }
                        None => {
                            let id = self.record_for(runtime)?;
                            *target = Some(id);
                            self.pinned += 1;
                            id
                        }
                    };
                    self.resolve_record(id, mem, element, visiting)?;
                }
                Ok(())
            }
        }
    }

    /// Resolves every member of one record instance.
    ///
    /// Each member is sampled on a copy while its slot stays live, so a
    /// recursive visit of the same record type sees and pins the same slot.
    /// Pins found on the copy are folded back afterwards.
    fn resolve_record(
        &mut self,
        id: RecordId,
        mem: &dyn Memory,
        addr: Address,
        visiting: &mut Visiting,
    ) -> WalkResult<()> {
        if !visiting.insert((id, addr)) {
            return Ok(());
        }
        for index in 0..self.record(id).members.len() {
            let member = &self.record(id).members[index];
            if self.is_resolved(&member.walker) {
                continue;
            }
            let offset = member.offset;
            let mut sample = member.walker.clone();

            let outcome = self.resolve_field(&mut sample, mem, addr.offset(offset), visiting);
            merge_pins(&mut self.record_mut(id).members[index].walker, sample);
            outcome?;
        }
        Ok(())
    }
}

/// Folds the pins of a sampled copy into the live walker; the live walker wins.
fn merge_pins(live: &mut FieldWalker, sample: FieldWalker) {
    match (&mut live.kind, sample.kind) {
        (WalkerKind::Pointer(pointer), WalkerKind::Pointer(found)) => {
            if pointer.state == Resolution::Unresolved {
                *pointer = found;
            } else if found.state == Resolution::Resolved {
                merge_pins(&mut pointer.target, found.target);
            }
        }
        (WalkerKind::BackRef { target }, WalkerKind::BackRef { target: found })
        | (WalkerKind::Dynamic { target, .. }, WalkerKind::Dynamic { target: found, .. }) => {
            if target.is_none() {
                *target = found;
            }
        }
        (WalkerKind::Vector(inner), WalkerKind::Vector(found))
        | (WalkerKind::Array(inner, _), WalkerKind::Array(found, _)) => merge_pins(inner, *found),
        _ => {}
    }
}

/// Object address behind a back-reference uid; uid 0 and dangling uids are null.
pub(crate) fn resolve_uid(mem: &dyn Memory, uid: u32) -> Option<Address> {
    if uid == 0 {
        return None;
    }
    mem.ref_target(uid).filter(|addr| !addr.is_null())
}

/// Address of element `index` of a dynamic array, `None` for an empty slot.
pub(crate) fn dynamic_element(
    mem: &dyn Memory,
    form: DynamicForm,
    data: Address,
    index: usize,
) -> WalkResult<Option<Address>> {
    let slot = data.offset(index * form.slot_size());
    let element = match form {
        DynamicForm::RefArray => resolve_uid(mem, mem.read_u32(slot)?),
        DynamicForm::ObjArray | DynamicForm::ClonesArray => {
            Some(mem.read_address(slot)?).filter(|addr| !addr.is_null())
        }
    };
    Ok(element)
}
