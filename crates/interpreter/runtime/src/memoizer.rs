use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use nbtschema_algebra::{merge, MergeStrategy, NbtElement};
use nbtschema_classfile::MethodPointer;
use nbtschema_values::{TypedTag, Value};

use crate::call_result::CallResult;
use crate::class_loader::ClassLoader;
use crate::descriptor;
use crate::error::InterpreterError;
use crate::method_call::MethodCall;
use crate::runner::MethodRunner;
use crate::well_known;

/// Resolves the default schema a declared NBT-shaped parameter seeds its callee-side `TypedTag`
/// with; `None` for anything else, which is passed through to the callee unchanged.
fn default_shape_for_param(index: usize, is_instance: bool, declaring_class: &str, param_types: &[String]) -> Option<NbtElement> {
    if is_instance && index == 0 {
        return well_known::default_nbt_shape(declaring_class);
    }
    let param_index = if is_instance { index - 1 } else { index };
    param_types.get(param_index).and_then(|d| descriptor::class_name(d)).and_then(well_known::default_nbt_shape)
}

/// Resolves and caches method analyses (4.3): the cache of completed `CallResult`s, the active
/// call stack used for recursion detection, the set of recursion-hit calls (`boxedTypes`), and
/// the process-wide static-field map fed by each class's `<clinit>`.
pub struct Memoizer {
    loader: ClassLoader,
    cache: RefCell<HashMap<MethodCall, CallResult>>,
    call_stack: RefCell<Vec<MethodCall>>,
    boxed_types: RefCell<HashSet<MethodCall>>,
    /// Base names of every `Boxed(name)` synthesized so far, derived from the recursion-hit
    /// call's `name_seed()`. The flatten pass only ever sees a compound's `CompoundNameSeed`
    /// (not the full `MethodCall` that produced it), so this is what it checks a flattened
    /// `Compound`'s name against to decide whether it's recursion-critical.
    boxed_names: RefCell<HashSet<String>>,
    statics: RefCell<HashMap<String, Value>>,
    initialized_classes: RefCell<HashSet<String>>,
}

impl Memoizer {
    pub fn new(loader: ClassLoader) -> Self {
        Self {
            loader,
            cache: RefCell::new(HashMap::new()),
            call_stack: RefCell::new(Vec::new()),
            boxed_types: RefCell::new(HashSet::new()),
            boxed_names: RefCell::new(HashSet::new()),
            statics: RefCell::new(HashMap::new()),
            initialized_classes: RefCell::new(HashSet::new()),
        }
    }

    pub fn class_loader(&self) -> &ClassLoader {
        &self.loader
    }

    pub fn is_boxed(&self, call: &MethodCall) -> bool {
        self.boxed_types.borrow().contains(call)
    }

    pub fn is_boxed_name(&self, name: &str) -> bool {
        self.boxed_names.borrow().contains(name)
    }

    pub fn get_static(&self, key: &str) -> Value {
        self.statics.borrow().get(key).cloned().unwrap_or(Value::Unknown)
    }

    pub fn put_static(&self, key: impl Into<String>, value: Value) {
        self.statics.borrow_mut().insert(key.into(), value);
    }

    /// Runs `class`'s `<clinit>` the first time the class is visited, feeding any `PUTSTATIC`
    /// side effects into the shared statics map. A class with no `<clinit>`, or none at all, is
    /// a silent no-op.
    fn ensure_class_initialized(&self, class: &str) -> Result<(), InterpreterError> {
        if !self.initialized_classes.borrow_mut().insert(class.to_owned()) {
            return Ok(());
        }
        let Some(class_file) = self.loader.load(class)? else { return Ok(()) };
        let Some(method) = class_file.find_method("<clinit>", "()V") else { return Ok(()) };
        let Some(code) = method.code.clone() else { return Ok(()) };

        let pointer = MethodPointer::new(class.to_owned(), "<clinit>", "()V");
        let initial_locals = vec![Value::Unknown; code.max_locals as usize];
        let mut runner = MethodRunner::new(self, pointer, Rc::clone(&class_file), code, initial_locals);
        runner.run()?;
        Ok(())
    }

    /// `call(ptr, args, overrideOptional, ignoreSuper)`, per 4.3.
    pub fn call(
        &self,
        pointer: MethodPointer,
        args: &[Value],
        override_optional: bool,
        ignore_super: bool,
    ) -> Result<CallResult, InterpreterError> {
        let call = MethodCall::new(pointer.clone(), args, override_optional);

        if let Some(cached) = self.cache.borrow().get(&call) {
            return Ok(cached.clone());
        }

        if self.call_stack.borrow().contains(&call) {
            self.boxed_types.borrow_mut().insert(call.clone());
            self.boxed_names.borrow_mut().insert(call.name_seed().disambiguated_name());
            let returns_compound = descriptor::class_name(descriptor::return_descriptor(&pointer.signature))
                .is_some_and(|c| c == well_known::NBT_COMPOUND_CLASS);
            return Ok(CallResult::boxed(&call, args, returns_compound));
        }

        self.ensure_class_initialized(&pointer.class)?;

        let Some(class_file) = self.loader.load(&pointer.class)? else {
            return Ok(CallResult::pass_through(args.len()));
        };

        let Some(method) = class_file.find_method(&pointer.name, &pointer.signature) else {
            return Ok(CallResult::pass_through(args.len()));
        };
        let Some(code) = method.code.clone() else {
            return Ok(CallResult::pass_through(args.len()));
        };

        self.call_stack.borrow_mut().push(call.clone());

        let is_instance = !method.is_static();
        let param_types = descriptor::param_descriptors(&pointer.signature);
        let slots = descriptor::arg_slot_indices(is_instance, &param_types);

        let mut seed_args: Vec<Value> = args
            .iter()
            .enumerate()
            .map(|(index, arg)| match default_shape_for_param(index, is_instance, &pointer.class, &param_types) {
                Some(shape) => {
                    let mut tag = TypedTag::new(shape);
                    if override_optional {
                        tag.raise_optional_until(u32::MAX);
                    }
                    Value::Typed(tag)
                }
                None => arg.clone(),
            })
            .collect();

        let unnamed_compounds: Vec<usize> = seed_args
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match v.as_typed() {
                Some(tag) => matches!(&*tag.nbt.borrow(), NbtElement::Compound(c) if c.name().is_none()).then_some(i),
                None => None,
            })
            .collect();
        if let [only] = unnamed_compounds[..] {
            if let Some(tag) = seed_args[only].as_typed() {
                if let NbtElement::Compound(compound) = &mut *tag.nbt.borrow_mut() {
                    compound.set_name_if_absent(call.name_seed());
                }
            }
        }

        let max_locals = code.max_locals as usize;
        let highest_slot = slots.last().map(|&s| s as usize + 1).unwrap_or(0);
        let mut initial_locals = vec![Value::Unknown; max_locals.max(highest_slot)];
        for (logical_index, &slot) in slots.iter().enumerate() {
            initial_locals[slot as usize] = seed_args[logical_index].clone();
        }

        let mut runner = MethodRunner::new(self, pointer.clone(), Rc::clone(&class_file), code, initial_locals)
            .with_ignore_super(ignore_super);
        runner.run()?;

        let mut return_nbt = NbtElement::Any;
        for value in runner.take_return_values() {
            let contributed = value.as_typed().map(|tag| tag.nbt.borrow().clone()).unwrap_or(NbtElement::Any);
            return_nbt = merge(return_nbt, contributed, MergeStrategy::DifferentDataSet)
                .map_err(|source| InterpreterError::IncompatibleMerge { method: pointer.clone(), pc: 0, source })?;
        }

        let args_nbt = slots
            .iter()
            .map(|&slot| runner.frame().get_local(slot).as_typed().map(|tag| tag.nbt.borrow().clone()))
            .collect();

        self.call_stack.borrow_mut().pop();

        let result = CallResult { args_nbt, return_nbt };
        self.cache.borrow_mut().insert(call, result.clone());
        Ok(result)
    }
}
