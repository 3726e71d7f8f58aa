//! AST to IR lowering
//!
//! Variables live in memory: every scalar and array gets a stack slot in its
//! function's entry block, and each read goes through a load. String slots
//! hold a pointer to a heap buffer sized from the length the analyzer
//! computed.

use std::collections::{HashMap, HashSet};

use log::debug;

use pcc::parser::ast::{
    AssignOp, Assignment, BinaryOp as AstBinaryOp, ElseBranch, Expr, IfStmt, Literal, Param,
    Program, Stmt, Target, UnaryOp,
};
use pcc::typechecker::types::{common_numeric_type, Type as SourceType};
use pcc::typechecker::{Scope, ScopeKey};

use super::runtime::{self, RuntimeShim, MALLOC, MEMCPY, PRINTF, REALLOC, SCANF};
use super::{CodegenError, CodegenResult};
use crate::ir::builder::{FunctionBuilder, ModuleBuilder};
use crate::ir::*;

/// What a variable's slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageKind {
    Scalar(SourceType),
    /// Slot holds a pointer to the first element.
    Array(SourceType),
}

#[derive(Debug, Clone, PartialEq)]
struct Storage {
    slot: Value,
    kind: StorageKind,
    /// Size of a string's heap buffer, when it is the same on every path here.
    length: Option<usize>,
}

/// A lowered expression before it is used.
enum Operand {
    Immediate(Value),
    /// Memory-resident value that must be loaded first.
    Address(Value),
    Computed(Value),
}

#[derive(Debug, Clone)]
struct Subroutine {
    signature: FunctionType,
    params: Vec<SourceType>,
    return_type: SourceType,
}

/// Lowering state for one compilation. Consumed by [`Lowering::lower_program`].
pub struct Lowering {
    module: ModuleBuilder,
    runtime: RuntimeShim,
    storage: HashMap<ScopeKey, Storage>,
    subroutines: HashMap<String, Subroutine>,
}

impl Lowering {
    /// Create a lowering context. Declares the runtime shim in `module`.
    pub fn new(mut module: ModuleBuilder) -> Self {
        let runtime = RuntimeShim::declare(&mut module);
        Self {
            module,
            runtime,
            storage: HashMap::new(),
            subroutines: HashMap::new(),
        }
    }

    pub fn lower_program(mut self, program: &Program) -> CodegenResult<Module> {
        let scope = Scope::TopLevel;
        let mut main = FunctionBuilder::new("main", Vec::new(), Type::I32);
        self.lower_block(&program.statements, &mut main, &scope)?;
        main.ret(Some(Value::i32(0)));

        self.module.add_function(main.build());
        Ok(self.module.build())
    }

    fn lower_block(
        &mut self,
        statements: &[Stmt],
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        for stmt in statements {
            self.lower_stmt(stmt, fb, scope)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<()> {
        debug!("lowering {} in {}", stmt.label(), scope);
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr, fb, scope)?;
            }
            Stmt::Assignment(assignment) => self.lower_assignment(assignment, fb, scope)?,
            Stmt::ArrayDeclaration { ty, name, size } => {
                self.lower_array_declaration(*ty, name, size, fb, scope)?
            }
            Stmt::Output { expr } => self.lower_output(expr, fb, scope)?,
            Stmt::Input { target, .. } => self.lower_input(target, fb, scope)?,
            Stmt::If(stmt) => self.lower_if(stmt, None, fb, scope)?,
            Stmt::While { condition, body } => {
                self.lower_loop("while", condition, body, None, fb, scope)?
            }
            Stmt::For { init, bound, body } => {
                self.lower_assignment(init, fb, scope)?;
                let (test, step) = counting_loop(init, bound)?;
                self.lower_loop("for", &test, body, Some(&step), fb, scope)?;
            }
            Stmt::FunctionDecl {
                name,
                params,
                body,
                return_type,
            } => self.lower_function(name, params, body, *return_type)?,
            Stmt::Return { expr } => self.lower_return(expr, fb, scope)?,
        }
        Ok(())
    }

    fn lower_assignment(
        &mut self,
        assignment: &Assignment,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        match &assignment.target {
            Target::Variable {
                name,
                ty: SourceType::Str,
                length,
            } => self.assign_string(name, &assignment.value, *length, fb, scope),
            Target::Variable { name, ty, .. } => {
                let value = self.lower_value(&assignment.value, *ty, fb, scope)?;
                let slot = self.scalar_slot(name, *ty, fb, scope)?;
                fb.store(value, slot)
            }
            Target::Element { name, index, .. } => {
                let element = self.array_element_type(name, scope)?;
                let value = self.lower_value(&assignment.value, element, fb, scope)?;
                let ptr = self.element_address(name, index, fb, scope)?;
                fb.store(value, ptr)
            }
        }
    }

    /// Numeric slot for `name`, allocated on first use. A different type
    /// than the one already stored gets a fresh slot.
    fn scalar_slot(
        &mut self,
        name: &str,
        ty: SourceType,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let key = ScopeKey::new(name, scope);
        if let Some(storage) = self.storage.get(&key) {
            if storage.kind == StorageKind::Scalar(ty) {
                return Ok(storage.slot.clone());
            }
        }

        let slot = fb.alloca_entry(&format!("{}.slot", name), ir_type(ty)?);
        self.storage.insert(
            key,
            Storage {
                slot: slot.clone(),
                kind: StorageKind::Scalar(ty),
                length: None,
            },
        );
        Ok(slot)
    }

    fn assign_string(
        &mut self,
        name: &str,
        value: &Expr,
        length: usize,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        let source = self.lower_value(value, SourceType::Str, fb, scope)?;
        let key = ScopeKey::new(name, scope);

        let buffer = match self.storage.get(&key).cloned() {
            Some(Storage {
                slot,
                kind: StorageKind::Scalar(SourceType::Str),
                length: current,
            }) => {
                if current == Some(length) {
                    fb.load(slot)?
                } else {
                    let old = fb.load(slot.clone())?;
                    let size = byte_count(fb, length)?;
                    let resized = call_value(fb, REALLOC, &self.runtime.realloc, vec![old, size])?;
                    fb.store(resized.clone(), slot)?;
                    if let Some(storage) = self.storage.get_mut(&key) {
                        storage.length = Some(length);
                    }
                    resized
                }
            }
            _ => {
                let slot = fb.alloca_entry(&format!("{}.slot", name), Type::byte_ptr());
                fb.store_entry(Value::Null(Type::byte_ptr()), slot.clone())?;
                let size = byte_count(fb, length)?;
                let block = call_value(fb, MALLOC, &self.runtime.malloc, vec![size])?;
                fb.store(block.clone(), slot.clone())?;
                self.storage.insert(
                    key,
                    Storage {
                        slot,
                        kind: StorageKind::Scalar(SourceType::Str),
                        length: Some(length),
                    },
                );
                block
            }
        };

        let size = byte_count(fb, length)?;
        call_value(fb, MEMCPY, &self.runtime.memcpy, vec![buffer, source, size])?;
        Ok(())
    }

    fn lower_array_declaration(
        &mut self,
        ty: SourceType,
        name: &str,
        size: &Expr,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        let count = self.lower_value(size, SourceType::Int32, fb, scope)?;
        // Sized in elements, not bytes, whatever the element width.
        let count = fb.cast(CastOp::SExt, count, Type::I64);
        let raw = call_value(fb, MALLOC, &self.runtime.malloc, vec![count])?;
        let element = ir_type(ty)?;
        let first = fb.cast(CastOp::Bitcast, raw, Type::pointer_to(element.clone()));

        let key = ScopeKey::new(name, scope);
        let slot = match self.storage.get(&key) {
            Some(storage) if storage.kind == StorageKind::Array(ty) => storage.slot.clone(),
            _ => {
                let slot = fb.alloca_entry(&format!("{}.slot", name), Type::pointer_to(element));
                self.storage.insert(
                    key,
                    Storage {
                        slot: slot.clone(),
                        kind: StorageKind::Array(ty),
                        length: None,
                    },
                );
                slot
            }
        };
        fb.store(first, slot)
    }

    fn lower_output(&mut self, expr: &Expr, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<()> {
        let ty = expr.ty();
        let value = self.lower_value(expr, ty, fb, scope)?;
        let format = self.runtime.format(ty, fb)?;
        fb.call(PRINTF, &self.runtime.printf, vec![format, value]);

        let newline = self.runtime.newline(fb)?;
        fb.call(PRINTF, &self.runtime.printf, vec![newline]);
        Ok(())
    }

    fn lower_input(&mut self, target: &Target, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<()> {
        let (ptr, ty) = match target {
            Target::Variable { name, .. } => {
                let storage = self.lookup(name, scope)?;
                match storage.kind {
                    // Read straight into the string's heap buffer.
                    StorageKind::Scalar(SourceType::Str) => (fb.load(storage.slot)?, SourceType::Str),
                    StorageKind::Scalar(ty) => (storage.slot, ty),
                    StorageKind::Array(_) => {
                        return Err(CodegenError::InvalidOperand(format!(
                            "INPUT into array '{}' needs an index",
                            name
                        )))
                    }
                }
            }
            Target::Element { name, index, .. } => {
                let ty = self.array_element_type(name, scope)?;
                (self.element_address(name, index, fb, scope)?, ty)
            }
        };

        let format = self.runtime.format(ty, fb)?;
        fb.call(SCANF, &self.runtime.scanf, vec![format, ptr]);
        Ok(())
    }

    /// `join` is the chain's shared `if.end` when lowering an else-if arm.
    fn lower_if(
        &mut self,
        stmt: &IfStmt,
        join: Option<usize>,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        let cond = self.lower_condition(&stmt.condition, fb, scope)?;
        let then_block = fb.create_block("if.then");
        let else_block = stmt.else_branch.as_ref().map(|_| fb.create_block("if.else"));
        let (join_block, owns_join) = match join {
            Some(block) => (block, false),
            None => (fb.create_block("if.end"), true),
        };
        fb.cond_branch(cond, then_block, else_block.unwrap_or(join_block));

        let before = self.storage.clone();
        fb.switch_to_block(then_block);
        self.lower_block(&stmt.then_body, fb, scope)?;
        if !fb.is_terminated() {
            fb.branch(join_block);
        }
        let after_then = std::mem::replace(&mut self.storage, before);

        if let (Some(else_block), Some(branch)) = (else_block, &stmt.else_branch) {
            fb.switch_to_block(else_block);
            match branch {
                ElseBranch::Block(body) => {
                    self.lower_block(body, fb, scope)?;
                    if !fb.is_terminated() {
                        fb.branch(join_block);
                    }
                }
                ElseBranch::If(nested) => self.lower_if(nested, Some(join_block), fb, scope)?,
            }
        }
        self.merge_storage(after_then);

        if owns_join {
            fb.switch_to_block(join_block);
        }
        Ok(())
    }

    /// Body first, test at the bottom: the body always runs once.
    fn lower_loop(
        &mut self,
        kind: &str,
        condition: &Expr,
        body: &[Stmt],
        step: Option<&Assignment>,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<()> {
        let body_block = fb.create_block(&format!("{}.body", kind));
        let exit_block = fb.create_block(&format!("{}.exit", kind));
        fb.branch(body_block);
        fb.switch_to_block(body_block);

        // The body is also entered from the back edge.
        self.forget_string_lengths(scope);
        self.lower_block(body, fb, scope)?;
        if let Some(step) = step {
            self.lower_assignment(step, fb, scope)?;
        }

        let cond = self.lower_condition(condition, fb, scope)?;
        fb.cond_branch(cond, body_block, exit_block);
        fb.switch_to_block(exit_block);
        Ok(())
    }

    fn lower_function(
        &mut self,
        name: &str,
        params: &[Param],
        body: &[Stmt],
        return_type: SourceType,
    ) -> CodegenResult<()> {
        if runtime::is_reserved(name) {
            return Err(CodegenError::ReservedName(name.to_string()));
        }
        if self.subroutines.contains_key(name) {
            return Err(CodegenError::DuplicateFunction(name.to_string()));
        }

        let ir_params = params
            .iter()
            .map(|param| {
                Ok(Parameter {
                    name: format!("{}.arg", param.name),
                    ty: ir_type(param.ty)?,
                })
            })
            .collect::<CodegenResult<Vec<_>>>()?;
        let ret = ir_type(return_type)?;

        // Registered before the body so the subroutine can call itself.
        self.subroutines.insert(
            name.to_string(),
            Subroutine {
                signature: FunctionType::new(
                    ret.clone(),
                    ir_params.iter().map(|param| param.ty.clone()).collect(),
                ),
                params: params.iter().map(|param| param.ty).collect(),
                return_type,
            },
        );

        let scope = Scope::Function(name.to_string());
        let mut fb = FunctionBuilder::new(name, ir_params.clone(), ret);
        for (param, incoming) in params.iter().zip(&ir_params) {
            let slot = self.scalar_slot(&param.name, param.ty, &mut fb, &scope)?;
            fb.store(incoming.value(), slot)?;
        }

        self.lower_block(body, &mut fb, &scope)?;
        if !fb.is_terminated() {
            fb.ret(Some(zero(return_type)?));
        }

        self.module.add_function(fb.build());
        Ok(())
    }

    fn lower_return(&mut self, expr: &Expr, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<()> {
        let return_type = self
            .subroutines
            .get(fb.name())
            .map(|sub| sub.return_type)
            .ok_or_else(|| {
                CodegenError::InvalidOperand(format!("RETURN outside a subroutine in {}", scope))
            })?;
        let value = self.lower_value(expr, return_type, fb, scope)?;
        fb.ret(Some(value));

        let rest = fb.create_block("after.return");
        fb.switch_to_block(rest);
        Ok(())
    }

    /// Lower an expression and convert the result to `want`.
    fn lower_value(
        &mut self,
        expr: &Expr,
        want: SourceType,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let value = match self.lower_expr(expr, fb, scope)? {
            Operand::Immediate(value) | Operand::Computed(value) => value,
            Operand::Address(ptr) => fb.load(ptr)?,
        };
        convert(fb, value, want)
    }

    fn lower_expr(&mut self, expr: &Expr, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<Operand> {
        match expr {
            Expr::Constant { value, .. } => match value {
                Literal::Int(value) => Ok(Operand::Immediate(Value::i32(*value))),
                Literal::Double(value) => Ok(Operand::Immediate(Value::Double(*value))),
                Literal::Str(text) => {
                    let global = self.module.intern_string(text);
                    Ok(Operand::Computed(runtime::string_pointer(global, fb)?))
                }
            },
            Expr::Variable { name, .. } => {
                let storage = self.lookup(name, scope)?;
                match storage.kind {
                    StorageKind::Scalar(_) => Ok(Operand::Address(storage.slot)),
                    StorageKind::Array(_) => Err(CodegenError::InvalidOperand(format!(
                        "array '{}' used without an index",
                        name
                    ))),
                }
            }
            Expr::ArrayElement { name, index, .. } => {
                Ok(Operand::Address(self.element_address(name, index, fb, scope)?))
            }
            Expr::Binary {
                op, lhs, rhs, ty, length,
            } => {
                if op.is_comparison() {
                    // i1 here; `lower_value` widens it to the node's type.
                    let truth = self.lower_comparison(*op, lhs, rhs, *ty, fb, scope)?;
                    Ok(Operand::Computed(truth))
                } else if *ty == SourceType::Str {
                    let joined = self.lower_concat(lhs, rhs, *length, fb, scope)?;
                    Ok(Operand::Computed(joined))
                } else {
                    let result = self.lower_arithmetic(*op, lhs, rhs, *ty, fb, scope)?;
                    Ok(Operand::Computed(result))
                }
            }
            Expr::Unary {
                op: UnaryOp::Negate,
                operand,
                ty,
                ..
            } => {
                let value = self.lower_value(operand, *ty, fb, scope)?;
                let negated = match ty {
                    SourceType::Int32 => fb.binary(BinOp::Sub, Value::i32(0), value),
                    SourceType::Float64 => fb.binary(BinOp::FSub, Value::Double(-0.0), value),
                    other => {
                        return Err(CodegenError::InvalidOperand(format!(
                            "cannot negate a {} value",
                            other
                        )))
                    }
                };
                Ok(Operand::Computed(negated))
            }
            Expr::Call { name, args, .. } => Ok(Operand::Computed(self.lower_call(name, args, fb, scope)?)),
        }
    }

    /// Branch condition as `i1`. Non-comparisons are true when nonzero.
    fn lower_condition(&mut self, expr: &Expr, fb: &mut FunctionBuilder, scope: &Scope) -> CodegenResult<Value> {
        if let Expr::Binary {
            op, lhs, rhs, ty, ..
        } = expr
        {
            if op.is_comparison() {
                return self.lower_comparison(*op, lhs, rhs, *ty, fb, scope);
            }
        }

        let ty = expr.ty();
        let value = self.lower_value(expr, ty, fb, scope)?;
        match ty {
            SourceType::Int32 => Ok(fb.icmp(IntPredicate::Ne, value, Value::i32(0))),
            SourceType::Float64 => Ok(fb.fcmp(FloatPredicate::Une, value, Value::Double(0.0))),
            other => Err(CodegenError::InvalidOperand(format!(
                "a {} value cannot be a condition",
                other
            ))),
        }
    }

    fn lower_comparison(
        &mut self,
        op: AstBinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        ty: SourceType,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let left = self.lower_value(lhs, ty, fb, scope)?;
        let right = self.lower_value(rhs, ty, fb, scope)?;
        match ty {
            SourceType::Int32 => Ok(fb.icmp(int_predicate(op)?, left, right)),
            SourceType::Float64 => Ok(fb.fcmp(float_predicate(op)?, left, right)),
            other => Err(CodegenError::InvalidOperand(format!(
                "cannot compare {} values",
                other
            ))),
        }
    }

    fn lower_arithmetic(
        &mut self,
        op: AstBinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        ty: SourceType,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let left = self.lower_value(lhs, ty, fb, scope)?;
        let right = self.lower_value(rhs, ty, fb, scope)?;
        Ok(fb.binary(arithmetic_op(op, ty)?, left, right))
    }

    /// Fresh buffer holding `lhs` without its terminator, then all of `rhs`.
    fn lower_concat(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        length: usize,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let left = self.lower_value(lhs, SourceType::Str, fb, scope)?;
        let right = self.lower_value(rhs, SourceType::Str, fb, scope)?;

        let size = byte_count(fb, length)?;
        let buffer = call_value(fb, MALLOC, &self.runtime.malloc, vec![size])?;

        let prefix = lhs.length().saturating_sub(1);
        let count = byte_count(fb, prefix)?;
        call_value(fb, MEMCPY, &self.runtime.memcpy, vec![buffer.clone(), left, count])?;

        let tail = fb.gep(buffer.clone(), vec![Value::i32(to_i32(prefix)?)], false)?;
        let count = byte_count(fb, rhs.length())?;
        call_value(fb, MEMCPY, &self.runtime.memcpy, vec![tail, right, count])?;
        Ok(buffer)
    }

    fn lower_call(
        &mut self,
        name: &str,
        args: &[Expr],
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let subroutine = self
            .subroutines
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedName {
                name: name.to_string(),
                scope: scope.to_string(),
            })?;
        if args.len() != subroutine.params.len() {
            return Err(CodegenError::ArgumentCount {
                name: name.to_string(),
                expected: subroutine.params.len(),
                found: args.len(),
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(&subroutine.params) {
            values.push(self.lower_value(arg, *ty, fb, scope)?);
        }
        call_value(fb, name, &subroutine.signature, values)
    }

    fn element_address(
        &mut self,
        name: &str,
        index: &Expr,
        fb: &mut FunctionBuilder,
        scope: &Scope,
    ) -> CodegenResult<Value> {
        let storage = self.lookup(name, scope)?;
        if !matches!(storage.kind, StorageKind::Array(_)) {
            return Err(CodegenError::InvalidOperand(format!("'{}' is not an array", name)));
        }
        let first = fb.load(storage.slot)?;
        let index = self.lower_value(index, SourceType::Int32, fb, scope)?;
        fb.gep(first, vec![index], false)
    }

    fn array_element_type(&self, name: &str, scope: &Scope) -> CodegenResult<SourceType> {
        match self.lookup(name, scope)?.kind {
            StorageKind::Array(ty) => Ok(ty),
            StorageKind::Scalar(_) => Err(CodegenError::InvalidOperand(format!(
                "'{}' is not an array",
                name
            ))),
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> CodegenResult<Storage> {
        self.storage
            .get(&ScopeKey::new(name, scope))
            .cloned()
            .ok_or_else(|| CodegenError::UnresolvedName {
                name: name.to_string(),
                scope: scope.to_string(),
            })
    }

    /// Join the storage state of the branch just lowered with `other`.
    /// Anything the two paths disagree on loses its known length, so the
    /// next string assignment resizes instead of trusting a stale size.
    fn merge_storage(&mut self, other: HashMap<ScopeKey, Storage>) {
        let other_keys: HashSet<ScopeKey> = other.keys().cloned().collect();
        for (key, storage) in self.storage.iter_mut() {
            if !other_keys.contains(key) {
                storage.length = None;
            }
        }

        for (key, theirs) in other {
            match self.storage.get_mut(&key) {
                Some(ours) if ours.slot == theirs.slot && ours.length == theirs.length => {}
                Some(ours) => ours.length = None,
                None => {
                    self.storage.insert(
                        key,
                        Storage {
                            length: None,
                            ..theirs
                        },
                    );
                }
            }
        }
    }

    fn forget_string_lengths(&mut self, scope: &Scope) {
        for (key, storage) in self.storage.iter_mut() {
            if key.scope == *scope {
                storage.length = None;
            }
        }
    }
}

/// `v <= bound` and `v = v + 1` for `FOR v = ... TO bound`.
fn counting_loop(init: &Assignment, bound: &Expr) -> CodegenResult<(Expr, Assignment)> {
    let name = init.target.name().to_string();
    let counter = Expr::Variable {
        ty: init.ty,
        name: name.clone(),
        length: 0,
    };
    let test_ty = common_numeric_type(init.ty, bound.ty()).ok_or_else(|| {
        CodegenError::InvalidOperand(format!("loop variable '{}' is not numeric", name))
    })?;

    let test = Expr::Binary {
        op: AstBinaryOp::LessEqual,
        lhs: Box::new(counter.clone()),
        rhs: Box::new(bound.clone()),
        ty: test_ty,
        length: 0,
    };
    let step = Assignment {
        op: AssignOp::Set,
        ty: init.ty,
        target: Target::Variable {
            name,
            ty: init.ty,
            length: 0,
        },
        value: Expr::Binary {
            op: AstBinaryOp::Add,
            lhs: Box::new(counter),
            rhs: Box::new(Expr::Constant {
                ty: SourceType::Int32,
                value: Literal::Int(1),
                length: 0,
            }),
            ty: init.ty,
            length: 0,
        },
    };
    Ok((test, step))
}

fn ir_type(ty: SourceType) -> CodegenResult<Type> {
    match ty {
        SourceType::Int32 => Ok(Type::I32),
        SourceType::Float64 => Ok(Type::Double),
        SourceType::Str => Ok(Type::byte_ptr()),
        SourceType::Undetermined => Err(CodegenError::InvalidOperand(
            "undetermined type reached code generation".to_string(),
        )),
    }
}

fn zero(ty: SourceType) -> CodegenResult<Value> {
    match ty {
        SourceType::Int32 => Ok(Value::i32(0)),
        SourceType::Float64 => Ok(Value::Double(0.0)),
        other => Err(CodegenError::InvalidOperand(format!(
            "subroutines cannot return {}",
            other
        ))),
    }
}

/// Widen or narrow `value` to the representation of `want`.
fn convert(fb: &mut FunctionBuilder, value: Value, want: SourceType) -> CodegenResult<Value> {
    let target = ir_type(want)?;
    let from = value.ty();
    if from == target {
        return Ok(value);
    }

    let op = match (&from, &target) {
        (Type::I32, Type::Double) => CastOp::SiToFp,
        (Type::Double, Type::I32) => CastOp::FpToSi,
        (Type::I1, Type::I32) => CastOp::ZExt,
        (Type::I1, Type::Double) => CastOp::UiToFp,
        _ => {
            return Err(CodegenError::InvalidOperand(format!(
                "cannot convert {} to {}",
                from, target
            )))
        }
    };
    Ok(fb.cast(op, value, target))
}

/// Byte count for the shim: an `i32` sign-extended to `i64`.
fn byte_count(fb: &mut FunctionBuilder, count: usize) -> CodegenResult<Value> {
    let count = to_i32(count)?;
    Ok(fb.cast(CastOp::SExt, Value::i32(count), Type::I64))
}

fn to_i32(value: usize) -> CodegenResult<i32> {
    i32::try_from(value)
        .map_err(|_| CodegenError::InvalidOperand(format!("size {} does not fit in 32 bits", value)))
}

fn call_value(
    fb: &mut FunctionBuilder,
    callee: &str,
    signature: &FunctionType,
    args: Vec<Value>,
) -> CodegenResult<Value> {
    fb.call(callee, signature, args)
        .ok_or_else(|| CodegenError::InvalidOperand(format!("'{}' returns no value", callee)))
}

fn arithmetic_op(op: AstBinaryOp, ty: SourceType) -> CodegenResult<BinOp> {
    let op = match (ty, op) {
        (SourceType::Int32, AstBinaryOp::Add) => BinOp::Add,
        (SourceType::Int32, AstBinaryOp::Subtract) => BinOp::Sub,
        (SourceType::Int32, AstBinaryOp::Multiply) => BinOp::Mul,
        (SourceType::Int32, AstBinaryOp::Divide) => BinOp::SDiv,
        (SourceType::Int32, AstBinaryOp::Modulo) => BinOp::SRem,
        (SourceType::Float64, AstBinaryOp::Add) => BinOp::FAdd,
        (SourceType::Float64, AstBinaryOp::Subtract) => BinOp::FSub,
        (SourceType::Float64, AstBinaryOp::Multiply) => BinOp::FMul,
        (SourceType::Float64, AstBinaryOp::Divide) => BinOp::FDiv,
        (SourceType::Float64, AstBinaryOp::Modulo) => BinOp::FRem,
        _ => {
            return Err(CodegenError::InvalidOperand(format!(
                "'{}' is not arithmetic on {}",
                op.symbol(),
                ty
            )))
        }
    };
    Ok(op)
}

fn int_predicate(op: AstBinaryOp) -> CodegenResult<IntPredicate> {
    match op {
        AstBinaryOp::Equal => Ok(IntPredicate::Eq),
        AstBinaryOp::NotEqual => Ok(IntPredicate::Ne),
        AstBinaryOp::Less => Ok(IntPredicate::Slt),
        AstBinaryOp::LessEqual => Ok(IntPredicate::Sle),
        AstBinaryOp::Greater => Ok(IntPredicate::Sgt),
        AstBinaryOp::GreaterEqual => Ok(IntPredicate::Sge),
        other => Err(not_a_comparison(other)),
    }
}

fn float_predicate(op: AstBinaryOp) -> CodegenResult<FloatPredicate> {
    match op {
        AstBinaryOp::Equal => Ok(FloatPredicate::Ueq),
        AstBinaryOp::NotEqual => Ok(FloatPredicate::Une),
        AstBinaryOp::Less => Ok(FloatPredicate::Ult),
        AstBinaryOp::LessEqual => Ok(FloatPredicate::Ule),
        AstBinaryOp::Greater => Ok(FloatPredicate::Ugt),
        AstBinaryOp::GreaterEqual => Ok(FloatPredicate::Uge),
        other => Err(not_a_comparison(other)),
    }
}

fn not_a_comparison(op: AstBinaryOp) -> CodegenError {
    CodegenError::InvalidOperand(format!("'{}' is not a comparison", op.symbol()))
}
