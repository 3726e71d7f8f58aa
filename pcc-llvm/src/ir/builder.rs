//! IR builder utilities
//!
//! Helpers for constructing IR programmatically

use std::collections::{HashMap, HashSet};

use log::trace;

use super::*;
use crate::codegen::CodegenError;

/// IR builder for constructing modules
pub struct ModuleBuilder {
    module: Module,
    /// Global index keyed by buffer contents, so equal strings share one global.
    strings: HashMap<Vec<u8>, usize>,
    next_string: usize,
}

impl ModuleBuilder {
    /// Create a new module builder
    pub fn new(name: impl Into<String>, target_triple: impl Into<String>) -> Self {
        Self {
            module: Module::new(name, target_triple),
            strings: HashMap::new(),
            next_string: 0,
        }
    }

    pub fn set_source_filename(&mut self, name: impl Into<String>) {
        self.module.source_filename = name.into();
    }

    /// Declare an external function. Declaring the same name twice is a no-op.
    pub fn declare(&mut self, name: &str, signature: FunctionType) -> FunctionType {
        if let Some(existing) = self.declaration(name) {
            return existing.signature.clone();
        }
        self.module.declarations.push(Declaration {
            name: name.to_string(),
            signature: signature.clone(),
        });
        signature
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.module
            .declarations
            .iter()
            .find(|decl| decl.name == name)
    }

    /// Intern a NUL-terminated string under a fixed name.
    pub fn intern_named(&mut self, name: &str, text: &str) -> Value {
        self.intern(Some(name), text)
    }

    /// Intern a NUL-terminated string under a generated `.str.N` name.
    pub fn intern_string(&mut self, text: &str) -> Value {
        self.intern(None, text)
    }

    fn intern(&mut self, name: Option<&str>, text: &str) -> Value {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);

        if let Some(&index) = self.strings.get(&bytes) {
            return self.module.globals[index].address();
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let name = format!(".str.{}", self.next_string);
                self.next_string += 1;
                name
            }
        };
        trace!("intern global @{} ({} bytes)", name, bytes.len());

        let global = Global {
            name,
            bytes: bytes.clone(),
        };
        let address = global.address();
        self.strings.insert(bytes, self.module.globals.len());
        self.module.globals.push(global);
        address
    }

    /// Add a function to the module
    pub fn add_function(&mut self, func: Function) {
        self.module.functions.push(func);
    }

    /// Finish building and return the module
    pub fn build(self) -> Module {
        self.module
    }
}

/// IR builder for constructing functions
///
/// The builder starts positioned in an `entry` block. Stack slots are placed
/// at the head of that block, ahead of everything else, so they dominate
/// every use no matter which block first needed them.
pub struct FunctionBuilder {
    function: Function,
    current_block: Option<usize>,
    next_temp: usize,
    names: HashSet<String>,
    /// Number of slot-setup instructions at the head of the entry block.
    prelude: usize,
}

impl FunctionBuilder {
    /// Create a new function builder
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        let names = params.iter().map(|param| param.name.clone()).collect();
        let mut builder = Self {
            function: Function::new(name, params, return_type),
            current_block: None,
            next_temp: 0,
            names,
            prelude: 0,
        };
        let entry = builder.create_block("entry");
        builder.switch_to_block(entry);
        builder
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Create a new basic block
    pub fn create_block(&mut self, hint: &str) -> usize {
        let label = self.unique_name(hint);
        self.function.blocks.push(BasicBlock::new(label));
        self.function.blocks.len() - 1
    }

    /// Switch to a block
    pub fn switch_to_block(&mut self, block_id: usize) {
        self.current_block = Some(block_id);
    }

    pub fn label(&self, block_id: usize) -> &str {
        &self.function.blocks[block_id].label
    }

    /// Whether the current block already ends in a branch or return.
    pub fn is_terminated(&self) -> bool {
        self.current_block
            .map_or(true, |id| self.function.blocks[id].is_terminated())
    }

    /// Add an instruction to the current block
    pub fn add_instruction(&mut self, inst: Instruction) {
        if let Some(block_id) = self.current_block {
            trace!("{}: {:?}", self.function.blocks[block_id].label, inst);
            self.function.blocks[block_id].instructions.push(inst);
        }
    }

    /// Set the terminator for the current block
    pub fn set_terminator(&mut self, term: Terminator) {
        if let Some(block_id) = self.current_block {
            self.function.blocks[block_id].terminator = term;
        }
    }

    /// Reserve a stack slot for `ty` in the entry block.
    pub fn alloca_entry(&mut self, hint: &str, ty: Type) -> Value {
        let dest = self.unique_name(hint);
        self.insert_prelude(Instruction::Alloca {
            dest: dest.clone(),
            ty: ty.clone(),
        });
        Value::Local {
            name: dest,
            ty: Type::pointer_to(ty),
        }
    }

    /// Initialize a slot in the entry block, right after its allocation.
    pub fn store_entry(&mut self, value: Value, ptr: Value) -> Result<(), CodegenError> {
        check_store(&value, &ptr)?;
        self.insert_prelude(Instruction::Store { value, ptr });
        Ok(())
    }

    fn insert_prelude(&mut self, inst: Instruction) {
        trace!("entry prelude: {:?}", inst);
        self.function.blocks[0].instructions.insert(self.prelude, inst);
        self.prelude += 1;
    }

    pub fn load(&mut self, ptr: Value) -> Result<Value, CodegenError> {
        let ty = ptr
            .ty()
            .pointee()
            .cloned()
            .ok_or_else(|| CodegenError::InvalidOperand(format!("cannot load through {}", ptr.ty())))?;
        let dest = self.temp();
        self.add_instruction(Instruction::Load {
            dest: dest.clone(),
            ty: ty.clone(),
            ptr,
        });
        Ok(Value::Local { name: dest, ty })
    }

    pub fn store(&mut self, value: Value, ptr: Value) -> Result<(), CodegenError> {
        check_store(&value, &ptr)?;
        self.add_instruction(Instruction::Store { value, ptr });
        Ok(())
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let dest = self.temp();
        let ty = lhs.ty();
        self.add_instruction(Instruction::Binary {
            dest: dest.clone(),
            op,
            lhs,
            rhs,
        });
        Value::Local { name: dest, ty }
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let dest = self.temp();
        self.add_instruction(Instruction::ICmp {
            dest: dest.clone(),
            pred,
            lhs,
            rhs,
        });
        Value::Local {
            name: dest,
            ty: Type::I1,
        }
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        let dest = self.temp();
        self.add_instruction(Instruction::FCmp {
            dest: dest.clone(),
            pred,
            lhs,
            rhs,
        });
        Value::Local {
            name: dest,
            ty: Type::I1,
        }
    }

    pub fn cast(&mut self, op: CastOp, value: Value, to: Type) -> Value {
        let dest = self.temp();
        self.add_instruction(Instruction::Cast {
            dest: dest.clone(),
            op,
            value,
            to: to.clone(),
        });
        Value::Local { name: dest, ty: to }
    }

    /// `getelementptr`: the first index steps over `base`, the rest step into
    /// aggregates.
    pub fn gep(
        &mut self,
        base: Value,
        indices: Vec<Value>,
        inbounds: bool,
    ) -> Result<Value, CodegenError> {
        let base_ty = base.ty();
        let mut current = base_ty.pointee().cloned().ok_or_else(|| {
            CodegenError::InvalidOperand(format!("cannot index through {}", base_ty))
        })?;
        for _ in indices.iter().skip(1) {
            current = current.element().cloned().ok_or_else(|| {
                CodegenError::InvalidOperand(format!("cannot index into {}", current))
            })?;
        }

        let result = Type::pointer_to(current);
        let dest = self.temp();
        self.add_instruction(Instruction::GetElementPtr {
            dest: dest.clone(),
            result: result.clone(),
            base,
            indices,
            inbounds,
        });
        Ok(Value::Local {
            name: dest,
            ty: result,
        })
    }

    /// Emit a call. Returns the result unless the callee returns `void`.
    pub fn call(&mut self, callee: &str, signature: &FunctionType, args: Vec<Value>) -> Option<Value> {
        let dest = if signature.ret == Type::Void {
            None
        } else {
            Some(self.temp())
        };
        self.add_instruction(Instruction::Call {
            dest: dest.clone(),
            callee: callee.to_string(),
            signature: signature.clone(),
            args,
        });
        dest.map(|name| Value::Local {
            name,
            ty: signature.ret.clone(),
        })
    }

    pub fn branch(&mut self, target: usize) {
        let target = self.label(target).to_string();
        self.set_terminator(Terminator::Branch { target });
    }

    pub fn cond_branch(&mut self, cond: Value, then_block: usize, else_block: usize) {
        let then_block = self.label(then_block).to_string();
        let else_block = self.label(else_block).to_string();
        self.set_terminator(Terminator::CondBranch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.set_terminator(Terminator::Return(value));
    }

    fn temp(&mut self) -> String {
        let temp = format!("t{}", self.next_temp);
        self.next_temp += 1;
        temp
    }

    /// Hinted names get a numeric suffix on reuse: `if.then`, `if.then.1`, ...
    fn unique_name(&mut self, hint: &str) -> String {
        let mut candidate = hint.to_string();
        let mut suffix = 0;
        while self.names.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", hint, suffix);
        }
        self.names.insert(candidate.clone());
        candidate
    }

    /// Finish building and return the function
    pub fn build(self) -> Function {
        self.function
    }
}

fn check_store(value: &Value, ptr: &Value) -> Result<(), CodegenError> {
    let ptr_ty = ptr.ty();
    match ptr_ty.pointee() {
        Some(pointee) if *pointee == value.ty() => Ok(()),
        _ => Err(CodegenError::InvalidOperand(format!(
            "cannot store {} through {}",
            value.ty(),
            ptr_ty
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_equal_strings_once() {
        let mut builder = ModuleBuilder::new("test", "x86_64-unknown-linux-gnu");
        let fmt = builder.intern_named("fmt_int", "%d");
        let again = builder.intern_string("%d");
        let other = builder.intern_string("hi");

        assert_eq!(fmt, again);
        assert_ne!(fmt, other);

        let module = builder.build();
        let names: Vec<_> = module.globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["fmt_int", ".str.0"]);
        assert_eq!(module.globals[0].bytes, b"%d\0");
    }

    #[test]
    fn hoists_slots_into_entry_block() {
        let mut builder = FunctionBuilder::new("main", vec![], Type::I32);
        let next = builder.create_block("next");
        builder.branch(next);
        builder.switch_to_block(next);

        let slot = builder.alloca_entry("x.slot", Type::I32);
        builder.store(Value::i32(1), slot.clone()).expect("store");
        builder.ret(Some(Value::i32(0)));

        let func = builder.build();
        assert!(matches!(
            func.blocks[0].instructions[0],
            Instruction::Alloca { ref dest, .. } if dest == "x.slot"
        ));
        assert_eq!(func.blocks[1].instructions.len(), 1);
        assert_eq!(slot.ty(), Type::pointer_to(Type::I32));
    }

    #[test]
    fn deduplicates_hinted_names() {
        let mut builder = FunctionBuilder::new("main", vec![], Type::I32);
        let first = builder.create_block("if.then");
        let second = builder.create_block("if.then");
        assert_eq!(builder.label(first), "if.then");
        assert_eq!(builder.label(second), "if.then.1");
    }

    #[test]
    fn rejects_mistyped_store() {
        let mut builder = FunctionBuilder::new("main", vec![], Type::I32);
        let slot = builder.alloca_entry("x.slot", Type::Double);
        assert!(builder.store(Value::i32(1), slot).is_err());
    }

    #[test]
    fn gep_steps_into_arrays() {
        let mut builder = FunctionBuilder::new("main", vec![], Type::I32);
        let global = Value::Global {
            name: "fmt_int".to_string(),
            ty: Type::pointer_to(Type::Array(3, Box::new(Type::I8))),
        };
        let ptr = builder
            .gep(global, vec![Value::i32(0), Value::i32(0)], true)
            .expect("gep");
        assert_eq!(ptr.ty(), Type::byte_ptr());
    }
}
