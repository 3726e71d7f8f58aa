//! Textual IR writer
//!
//! `Display` for a [`Module`] produces LLVM assembly that `llc`/`clang` accept.

use super::*;
use std::borrow::Cow;
use std::fmt;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", escape_bytes(self.source_filename.as_bytes()))?;
        writeln!(f, "target triple = \"{}\"", self.target_triple)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(
                f,
                "@{} = private unnamed_addr constant {} c\"{}\"",
                ident(&global.name),
                global.ty(),
                escape_bytes(&global.bytes)
            )?;
        }

        if !self.declarations.is_empty() {
            writeln!(f)?;
        }
        for decl in &self.declarations {
            write!(f, "declare {} @{}(", decl.signature.ret, ident(&decl.name))?;
            write_param_types(f, &decl.signature)?;
            writeln!(f, ")")?;
        }

        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }

        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {} @{}(", self.return_type, ident(&self.name))?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} %{}", param.ty, ident(&param.name))?;
        }
        writeln!(f, ") {{")?;

        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", ident(&block.label))?;
            for inst in &block.instructions {
                writeln!(f, "  {}", inst)?;
            }
            writeln!(f, "  {}", block.terminator)?;
        }

        writeln!(f, "}}")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloca { dest, ty } => write!(f, "%{} = alloca {}", ident(dest), ty),
            Instruction::Load { dest, ty, ptr } => {
                write!(f, "%{} = load {}, {}", ident(dest), ty, Typed(ptr))
            }
            Instruction::Store { value, ptr } => {
                write!(f, "store {}, {}", Typed(value), Typed(ptr))
            }
            Instruction::Binary { dest, op, lhs, rhs } => write!(
                f,
                "%{} = {} {}, {}",
                ident(dest),
                op.mnemonic(),
                Typed(lhs),
                rhs
            ),
            Instruction::ICmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(
                f,
                "%{} = icmp {} {}, {}",
                ident(dest),
                pred.mnemonic(),
                Typed(lhs),
                rhs
            ),
            Instruction::FCmp {
                dest,
                pred,
                lhs,
                rhs,
            } => write!(
                f,
                "%{} = fcmp {} {}, {}",
                ident(dest),
                pred.mnemonic(),
                Typed(lhs),
                rhs
            ),
            Instruction::Cast {
                dest,
                op,
                value,
                to,
            } => write!(
                f,
                "%{} = {} {} to {}",
                ident(dest),
                op.mnemonic(),
                Typed(value),
                to
            ),
            Instruction::GetElementPtr {
                dest,
                base,
                indices,
                inbounds,
                ..
            } => {
                let base_ty = base.ty();
                let source = base_ty.pointee().unwrap_or(&base_ty);
                write!(f, "%{} = getelementptr ", ident(dest))?;
                if *inbounds {
                    write!(f, "inbounds ")?;
                }
                write!(f, "{}, {}", source, Typed(base))?;
                for index in indices {
                    write!(f, ", {}", Typed(index))?;
                }
                Ok(())
            }
            Instruction::Call {
                dest,
                callee,
                signature,
                args,
            } => {
                if let Some(dest) = dest {
                    write!(f, "%{} = ", ident(dest))?;
                }
                write!(f, "call {}", signature.ret)?;
                if signature.variadic {
                    write!(f, " (")?;
                    write_param_types(f, signature)?;
                    write!(f, ")")?;
                }
                write!(f, " @{}(", ident(callee))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Typed(arg))?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Return(Some(value)) => write!(f, "ret {}", Typed(value)),
            Terminator::Return(None) => write!(f, "ret void"),
            Terminator::Branch { target } => write!(f, "br label %{}", ident(target)),
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "br {}, label %{}, label %{}",
                Typed(cond),
                ident(then_block),
                ident(else_block)
            ),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I8 => write!(f, "i8"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::Double => write!(f, "double"),
            Type::Ptr(inner) => write!(f, "{}*", inner),
            Type::Array(len, inner) => write!(f, "[{} x {}]", len, inner),
        }
    }
}

/// Bare operand, without its type.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Local { name, .. } => write!(f, "%{}", ident(name)),
            Value::Global { name, .. } => write!(f, "@{}", ident(name)),
            Value::Int { value, .. } => write!(f, "{}", value),
            // Hex keeps every double exact.
            Value::Double(value) => write!(f, "0x{:016X}", value.to_bits()),
            Value::Null(_) => write!(f, "null"),
        }
    }
}

/// Operand preceded by its type: `i32 %t0`.
struct Typed<'a>(&'a Value);

impl fmt::Display for Typed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.ty(), self.0)
    }
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
        }
    }
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Une => "une",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
        }
    }
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::SiToFp => "sitofp",
            CastOp::FpToSi => "fptosi",
            CastOp::UiToFp => "uitofp",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Bitcast => "bitcast",
        }
    }
}

fn write_param_types(f: &mut fmt::Formatter<'_>, signature: &FunctionType) -> fmt::Result {
    for (i, param) in signature.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param)?;
    }
    if signature.variadic {
        if signature.params.is_empty() {
            write!(f, "...")?;
        } else {
            write!(f, ", ...")?;
        }
    }
    Ok(())
}

/// Names outside `[-a-zA-Z$._][-a-zA-Z$._0-9]*` must be quoted.
fn ident(name: &str) -> Cow<'_, str> {
    let is_plain = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_');
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| is_plain(c) && !c.is_ascii_digit());
    if starts_ok && name.chars().all(is_plain) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", escape_bytes(name.as_bytes())))
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_types() {
        let ty = Type::pointer_to(Type::Array(4, Box::new(Type::I8)));
        assert_eq!(ty.to_string(), "[4 x i8]*");
        assert_eq!(Type::pointer_to(Type::Double).to_string(), "double*");
    }

    #[test]
    fn escapes_global_bytes() {
        assert_eq!(escape_bytes(b"%d\n\0"), "%d\\0A\\00");
        assert_eq!(escape_bytes(b"say \"hi\""), "say \\22hi\\22");
    }

    #[test]
    fn prints_doubles_as_hex() {
        assert_eq!(Value::Double(1.0).to_string(), "0x3FF0000000000000");
        assert_eq!(Value::Double(0.0).to_string(), "0x0000000000000000");
    }

    #[test]
    fn quotes_unusual_names() {
        assert_eq!(ident("x.slot"), "x.slot");
        assert_eq!(ident(".str.0"), ".str.0");
        assert_eq!(ident("1st"), "\"1st\"");
    }

    #[test]
    fn prints_variadic_call() {
        let call = Instruction::Call {
            dest: Some("t3".to_string()),
            callee: "printf".to_string(),
            signature: FunctionType::variadic(Type::I32, vec![Type::byte_ptr()]),
            args: vec![
                Value::Local {
                    name: "t1".to_string(),
                    ty: Type::byte_ptr(),
                },
                Value::i32(7),
            ],
        };
        assert_eq!(
            call.to_string(),
            "%t3 = call i32 (i8*, ...) @printf(i8* %t1, i32 7)"
        );
    }

    #[test]
    fn prints_module_header_and_globals() {
        let mut module = Module::new("output.ll", "x86_64-unknown-linux-gnu");
        module.source_filename = "code.pc".to_string();
        module.globals.push(Global {
            name: "fmt_int".to_string(),
            bytes: b"%d\0".to_vec(),
        });
        module.declarations.push(Declaration {
            name: "malloc".to_string(),
            signature: FunctionType::new(Type::byte_ptr(), vec![Type::I64]),
        });

        let text = module.to_string();
        assert!(text.starts_with("; ModuleID = 'output.ll'\n"));
        assert!(text.contains("source_filename = \"code.pc\""));
        assert!(text.contains("target triple = \"x86_64-unknown-linux-gnu\""));
        assert!(text.contains("@fmt_int = private unnamed_addr constant [3 x i8] c\"%d\\00\""));
        assert!(text.contains("declare i8* @malloc(i64)"));
    }

    #[test]
    fn prints_function_blocks() {
        let mut func = Function::new("main", vec![], Type::I32);
        let mut entry = BasicBlock::new("entry");
        entry.instructions.push(Instruction::Alloca {
            dest: "x.slot".to_string(),
            ty: Type::I32,
        });
        entry.terminator = Terminator::Return(Some(Value::i32(0)));
        func.blocks.push(entry);

        assert_eq!(
            func.to_string(),
            "define i32 @main() {\nentry:\n  %x.slot = alloca i32\n  ret i32 0\n}\n"
        );
    }
}
