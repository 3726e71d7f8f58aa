//! Shape of the IR produced for each construct.

use pcc_llvm::codegen::CodegenError;
use pcc_llvm::ir::{CastOp, Function, Instruction, IntPredicate, Module, Terminator, Type, Value};
use pcc_llvm::{CompileError, Compiler};

const TRIPLE: &str = "x86_64-unknown-linux-gnu";

fn compile(source: &str) -> Module {
    let _ = env_logger::builder().is_test(true).try_init();
    Compiler::new()
        .with_target(TRIPLE)
        .compile_source(source)
        .expect("source should compile")
}

fn main_of(module: &Module) -> &Function {
    module.function("main").expect("main function")
}

fn calls_to<'a>(func: &'a Function, callee: &'a str) -> impl Iterator<Item = &'a Instruction> + 'a {
    func.instructions()
        .filter(move |inst| matches!(inst, Instruction::Call { callee: name, .. } if name == callee))
}

fn allocas(func: &Function) -> usize {
    func.instructions()
        .filter(|inst| matches!(inst, Instruction::Alloca { .. }))
        .count()
}

fn labels_with_prefix(func: &Function, prefix: &str) -> usize {
    func.blocks
        .iter()
        .filter(|block| block.label.starts_with(prefix))
        .count()
}

/// The `i32` constant that was sign-extended into `value`, if any.
fn extended_constant(func: &Function, value: &Value) -> Option<i64> {
    let Value::Local { name, .. } = value else {
        return None;
    };
    func.instructions().find_map(|inst| match inst {
        Instruction::Cast {
            dest,
            op: CastOp::SExt,
            value: Value::Int { value, .. },
            ..
        } if dest == name => Some(*value),
        _ => None,
    })
}

fn call_args<'a>(inst: &'a Instruction) -> &'a [Value] {
    match inst {
        Instruction::Call { args, .. } => args,
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn numeric_reassignment_allocates_once() {
    let module = compile("x = 1\nx = 2\nx = x + 3");
    let main = main_of(&module);
    assert_eq!(allocas(main), 1);
    let stores = main
        .instructions()
        .filter(|inst| matches!(inst, Instruction::Store { .. }))
        .count();
    assert_eq!(stores, 3);
}

#[test]
fn string_reassignment_with_same_length_allocates_once() {
    let module = compile("s = \"ab\"\ns = \"cd\"");
    let main = main_of(&module);
    assert_eq!(allocas(main), 1);
    assert_eq!(calls_to(main, "malloc").count(), 1);
    assert_eq!(calls_to(main, "realloc").count(), 0);
    assert_eq!(calls_to(main, "memcpy").count(), 2);
}

#[test]
fn string_length_change_resizes_in_place() {
    let module = compile("s = \"ab\"\ns = \"abcd\"");
    let main = main_of(&module);
    assert_eq!(allocas(main), 1);
    assert_eq!(calls_to(main, "malloc").count(), 1);

    let realloc = calls_to(main, "realloc").next().expect("realloc call");
    assert_eq!(extended_constant(main, &call_args(realloc)[1]), Some(5));
}

#[test]
fn string_slot_starts_null_in_entry_block() {
    let module = compile("s = \"ab\"");
    let entry = &main_of(&module).blocks[0];
    assert!(matches!(
        &entry.instructions[1],
        Instruction::Store {
            value: Value::Null(_),
            ..
        }
    ));
}

#[test]
fn branch_disagreement_forces_resize() {
    let source = "\
s = \"ab\"
IF 1 THEN
s = \"abcd\"
ENDIF
s = \"wxyz\"";
    let module = compile(source);
    assert_eq!(calls_to(main_of(&module), "realloc").count(), 2);
}

#[test]
fn while_body_runs_before_condition() {
    let module = compile("WHILE 0 DO\nOUTPUT 1\nENDWHILE");
    let main = main_of(&module);

    assert_eq!(
        main.blocks[0].terminator,
        Terminator::Branch {
            target: "while.body".to_string()
        }
    );

    let body = main.block("while.body").expect("loop body");
    assert_eq!(
        body.instructions
            .iter()
            .filter(|inst| matches!(inst, Instruction::Call { callee, .. } if callee == "printf"))
            .count(),
        2
    );
    match &body.terminator {
        Terminator::CondBranch {
            then_block,
            else_block,
            ..
        } => {
            assert_eq!(then_block, "while.body");
            assert_eq!(else_block, "while.exit");
        }
        other => panic!("expected conditional back edge, got {:?}", other),
    }
    assert!(body.instructions.iter().any(|inst| matches!(
        inst,
        Instruction::ICmp {
            pred: IntPredicate::Ne,
            lhs: Value::Int { value: 0, .. },
            ..
        }
    )));
}

#[test]
fn double_array_is_sized_in_elements() {
    let module = compile("DOUBLE a[5]\na[1] = 2.5\nOUTPUT a[1]");
    let main = main_of(&module);

    let malloc = calls_to(main, "malloc").next().expect("malloc call");
    // Five elements, not forty bytes.
    assert_eq!(extended_constant(main, &call_args(malloc)[0]), Some(5));

    assert!(main.instructions().any(|inst| matches!(
        inst,
        Instruction::Cast {
            op: CastOp::Bitcast,
            to,
            ..
        } if *to == Type::pointer_to(Type::Double)
    )));
    assert_eq!(allocas(main), 1);
}

#[test]
fn else_if_chain_shares_one_join_block() {
    let source = "\
x = 2
IF x == 1 THEN
OUTPUT 10
ELSE IF x == 2 THEN
OUTPUT 20
ELSE IF x == 3 THEN
OUTPUT 30
ELSE
OUTPUT 40
ENDIF
OUTPUT 0";
    let module = compile(source);
    let main = main_of(&module);
    assert_eq!(labels_with_prefix(main, "if.end"), 1);
    assert_eq!(labels_with_prefix(main, "if.then"), 3);
    assert_eq!(labels_with_prefix(main, "if.else"), 3);

    let join = main.block("if.end").expect("join block");
    assert!(matches!(join.terminator, Terminator::Return(Some(_))));
    let branches_to_join = main
        .blocks
        .iter()
        .filter(|block| {
            matches!(&block.terminator, Terminator::Branch { target } if target == "if.end")
        })
        .count();
    assert_eq!(branches_to_join, 4);
}

#[test]
fn nested_if_gets_its_own_join() {
    let source = "\
IF 1 THEN
IF 2 THEN
OUTPUT 1
ENDIF
ENDIF";
    let module = compile(source);
    assert_eq!(labels_with_prefix(main_of(&module), "if.end"), 2);
}

#[test]
fn for_loop_steps_and_tests_at_bottom() {
    let module = compile("FOR i = 1 TO 3\nOUTPUT i\nNEXT i");
    let main = main_of(&module);
    let body = main.block("for.body").expect("loop body");

    assert!(body
        .instructions
        .iter()
        .any(|inst| matches!(inst, Instruction::ICmp { pred: IntPredicate::Sle, .. })));
    assert!(body.instructions.iter().any(|inst| matches!(
        inst,
        Instruction::Binary {
            rhs: Value::Int { value: 1, .. },
            ..
        }
    )));
    assert!(main.block("for.exit").is_some());
    assert_eq!(allocas(main), 1);
}

#[test]
fn mixed_arithmetic_widens_integer_side() {
    let module = compile("y = 1 + 2.5");
    let main = main_of(&module);
    let insts: Vec<_> = main.instructions().collect();
    let widen = insts
        .iter()
        .position(|inst| matches!(inst, Instruction::Cast { op: CastOp::SiToFp, .. }))
        .expect("sitofp");
    let add = insts
        .iter()
        .position(|inst| matches!(inst, Instruction::Binary { .. }))
        .expect("fadd");
    assert!(widen < add);
}

#[test]
fn comparison_value_is_widened() {
    let module = compile("b = 1 < 2\nOUTPUT b");
    let main = main_of(&module);
    assert!(main.instructions().any(|inst| matches!(
        inst,
        Instruction::Cast {
            op: CastOp::ZExt,
            to: Type::I32,
            ..
        }
    )));
}

#[test]
fn concatenation_copies_both_halves() {
    let module = compile("s = \"ab\" + \"cde\"");
    let main = main_of(&module);

    let mallocs: Vec<_> = calls_to(main, "malloc").collect();
    assert_eq!(extended_constant(main, &call_args(mallocs[0])[0]), Some(6));

    let copies: Vec<_> = calls_to(main, "memcpy")
        .map(|inst| extended_constant(main, &call_args(inst)[2]))
        .collect();
    assert_eq!(copies, vec![Some(2), Some(4), Some(6)]);

    assert!(main.instructions().any(|inst| matches!(
        inst,
        Instruction::GetElementPtr { indices, inbounds: false, .. }
            if indices == &vec![Value::i32(2)]
    )));
}

#[test]
fn equal_string_literals_share_a_global() {
    let module = compile("OUTPUT \"hi\"\nOUTPUT \"hi\"\nOUTPUT \"%d\"");
    let literals: Vec<_> = module
        .globals
        .iter()
        .filter(|global| global.name.starts_with(".str"))
        .collect();
    assert_eq!(literals.len(), 1);
    assert_eq!(literals[0].bytes, b"hi\0");
    assert_eq!(module.globals.len(), 5);
}

#[test]
fn output_uses_matching_format() {
    let module = compile("OUTPUT 2.5");
    let text = module.to_string();
    assert!(text.contains("getelementptr inbounds [4 x i8], [4 x i8]* @fmt_double, i32 0, i32 0"));
    assert!(text.contains("call i32 (i8*, ...) @printf(i8* %t0, double 0x4004000000000000)"));
}

#[test]
fn input_reads_into_slot() {
    let module = compile("n = 0\nINPUT n");
    let main = main_of(&module);
    let scanf = calls_to(main, "scanf").next().expect("scanf call");
    assert_eq!(
        call_args(scanf)[1],
        Value::Local {
            name: "n.slot".to_string(),
            ty: Type::pointer_to(Type::I32),
        }
    );
}

#[test]
fn first_assignment_in_branch_is_still_hoisted() {
    let module = compile("IF 1 THEN\nx = 5\nENDIF");
    let main = main_of(&module);
    assert!(matches!(
        &main.blocks[0].instructions[0],
        Instruction::Alloca { dest, .. } if dest == "x.slot"
    ));
}

#[test]
fn retyping_binds_a_fresh_slot() {
    let module = compile("x = 1\nx = 2.5");
    let main = main_of(&module);
    assert_eq!(allocas(main), 2);
    assert!(main.instructions().any(|inst| matches!(
        inst,
        Instruction::Alloca { dest, ty: Type::Double } if dest == "x.slot.1"
    )));
}

#[test]
fn subroutine_becomes_function() {
    let source = "\
DOUBLE SUBROUTINE scale(INT n, DOUBLE f)
RETURN n * f
ENDSUBROUTINE
OUTPUT scale(2, 1.5)";
    let module = compile(source);

    let scale = module.function("scale").expect("subroutine function");
    assert_eq!(scale.return_type, Type::Double);
    let params: Vec<_> = scale.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["n.arg", "f.arg"]);
    assert!(matches!(scale.blocks[0].terminator, Terminator::Return(Some(_))));
    assert_eq!(allocas(scale), 2);

    let main = main_of(&module);
    assert_eq!(calls_to(main, "scale").count(), 1);
    assert_eq!(module.functions.last().map(|f| f.name.as_str()), Some("main"));
}

#[test]
fn subroutine_without_return_yields_zero() {
    let module = compile("INT SUBROUTINE noop()\nx = 1\nENDSUBROUTINE");
    let noop = module.function("noop").expect("subroutine");
    assert_eq!(
        noop.blocks.last().map(|b| &b.terminator),
        Some(&Terminator::Return(Some(Value::i32(0))))
    );
}

#[test]
fn recursion_is_lowered() {
    let source = "\
INT SUBROUTINE fact(INT n)
IF n <= 1 THEN
RETURN 1
ENDIF
RETURN n * fact(n - 1)
ENDSUBROUTINE
OUTPUT fact(5)";
    let module = compile(source);
    let fact = module.function("fact").expect("fact");
    assert_eq!(calls_to(fact, "fact").count(), 1);
}

#[test]
fn main_always_returns_zero() {
    let module = compile("x = 1");
    let main = main_of(&module);
    assert_eq!(
        main.blocks.last().map(|b| &b.terminator),
        Some(&Terminator::Return(Some(Value::i32(0))))
    );
}

#[test]
fn wrong_argument_count_is_rejected() {
    let source = "\
INT SUBROUTINE twice(INT a)
RETURN a * 2
ENDSUBROUTINE
OUTPUT twice(1, 2)";
    let err = Compiler::new().compile_source(source).expect_err("should fail");
    assert!(matches!(
        err,
        CompileError::Codegen(CodegenError::ArgumentCount {
            expected: 1,
            found: 2,
            ..
        })
    ));
}

#[test]
fn shim_names_are_reserved() {
    let err = Compiler::new()
        .compile_source("INT SUBROUTINE malloc(INT n)\nRETURN n\nENDSUBROUTINE")
        .expect_err("should fail");
    assert!(matches!(
        err,
        CompileError::Codegen(CodegenError::ReservedName(ref name)) if name == "malloc"
    ));
}

#[test]
fn format_global_names_are_reserved() {
    let source = "\
INT SUBROUTINE fmt_int()
RETURN 1
ENDSUBROUTINE
OUTPUT fmt_int()";
    let err = Compiler::new().compile_source(source).expect_err("should fail");
    assert!(matches!(
        err,
        CompileError::Codegen(CodegenError::ReservedName(ref name)) if name == "fmt_int"
    ));
}

#[test]
fn redefinition_is_rejected() {
    let source = "\
INT SUBROUTINE f()
RETURN 1
ENDSUBROUTINE
INT SUBROUTINE f()
RETURN 2
ENDSUBROUTINE";
    let err = Compiler::new().compile_source(source).expect_err("should fail");
    assert!(matches!(
        err,
        CompileError::Codegen(CodegenError::DuplicateFunction(_))
    ));
}
