use nbtschema_algebra::{merge, NbtElement, MergeStrategy};
use nbtschema_values::{TypedTag, Value};

use crate::error::InterpreterError;
use crate::method_call::MethodCall;

/// The outcome of analyzing one method call: the NBT schema contributed to each NBT-typed
/// argument (`None` for arguments that were never `TypedTag`), and the merged schema of
/// whatever the method returns (`NbtElement::Any` if it returns nothing NBT-shaped).
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub args_nbt: Vec<Option<NbtElement>>,
    pub return_nbt: NbtElement,
}

impl CallResult {
    /// A `CallResult` that contributes no schema at all: used when a call target can't be
    /// resolved (missing class, abstract method with no override) so that analysis can proceed
    /// treating the call as a no-op from the schema's point of view.
    pub fn pass_through(arg_count: usize) -> Self {
        Self { args_nbt: vec![None; arg_count], return_nbt: NbtElement::Any }
    }

    /// A `CallResult` standing in for a detected recursive call: every NBT-typed argument (and
    /// the return, if it's a compound) becomes `Boxed(name)`, the back-reference the naming
    /// pass later resolves into a registry handle.
    pub fn boxed(call: &MethodCall, args: &[Value], returns_compound: bool) -> Self {
        let name = call.name_seed().disambiguated_name();
        let args_nbt = args
            .iter()
            .map(|arg| match arg {
                Value::Typed(_) => Some(NbtElement::Boxed(name.clone())),
                _ => None,
            })
            .collect();
        let return_nbt = if returns_compound { NbtElement::Boxed(name) } else { NbtElement::Any };
        Self { args_nbt, return_nbt }
    }

    /// Re-merges this result's `args_nbt` deltas onto the caller's live tags, per 4.3's
    /// `applyTo` rule. `pc` is the caller's current program counter, used to decide whether a
    /// delta must be forced optional before merging.
    pub fn apply_to(&self, actual_args: &mut [Value], pc: u32, call: &MethodCall) -> Result<(), InterpreterError> {
        for (index, actual) in actual_args.iter_mut().enumerate() {
            let Some(delta) = self.args_nbt.get(index).and_then(Option::as_ref) else { continue };
            if matches!(delta, NbtElement::Any) {
                continue;
            }
            let Value::Typed(tag) = actual else { continue };

            let delta = if tag.is_optional_at(pc) {
                force_optional(delta.clone())
            } else {
                delta.clone()
            };

            merge_delta_into_tag(tag, delta).map_err(|source| InterpreterError::IncompatibleMerge {
                method: call.pointer.clone(),
                pc,
                source,
            })?;
        }
        Ok(())
    }
}

fn force_optional(delta: NbtElement) -> NbtElement {
    match delta {
        NbtElement::Compound(mut c) => {
            for entry in c.entries_mut().values_mut() {
                entry.optional = true;
            }
            NbtElement::Compound(c)
        }
        other => other,
    }
}

fn merge_delta_into_tag(tag: &TypedTag, delta: NbtElement) -> Result<(), nbtschema_algebra::SchemaError> {
    let current = tag.nbt.borrow().clone();
    let updated = match (current, delta) {
        (NbtElement::Compound(mut live), NbtElement::Compound(delta)) => {
            live.push_flattened(NbtElement::Compound(delta));
            NbtElement::Compound(live)
        }
        (NbtElement::Compound(mut live), boxed @ NbtElement::Boxed(_)) => {
            live.push_flattened(boxed);
            NbtElement::Compound(live)
        }
        (live @ NbtElement::List(_), delta @ NbtElement::List(_)) => {
            merge(live, delta, MergeStrategy::SameDataSet)?
        }
        (live, delta) => merge(live, delta, MergeStrategy::SameDataSet)?,
    };
    *tag.nbt.borrow_mut() = updated;
    Ok(())
}
