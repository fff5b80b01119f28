use std::fmt::Write as _;

use selene_parser::ast::ProgramItem;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::interpreter::{signal_to_result, Interpreter};
use crate::value::Value;

/// One instruction in a `Chunk`. `EvalItem` is the only instruction
/// that does real work; `Return` marks the end of the program so the
/// VM's fetch loop has an explicit stop condition instead of running
/// off the end of the byte array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    EvalItem(u16),
    Return,
}

const TAG_EVAL_ITEM: u8 = 0;
const TAG_RETURN: u8 = 1;

/// A compiled program: the flat byte encoding of its opcodes plus the
/// table of `ProgramItem`s the `EvalItem` indices point into. The byte
/// array is the thing a real bytecode format would ship; the item
/// table stands in for "the rest of the compiled constants" a fuller
/// compiler would also serialize.
pub struct Chunk {
    code: Vec<u8>,
    items: Vec<ProgramItem>,
}

impl Chunk {
    fn push_op(&mut self, op: OpCode) {
        match op {
            OpCode::EvalItem(index) => {
                self.code.push(TAG_EVAL_ITEM);
                self.code.extend_from_slice(&index.to_le_bytes());
            }
            OpCode::Return => self.code.push(TAG_RETURN),
        }
    }

    pub fn items(&self) -> &[ProgramItem] {
        &self.items
    }

    /// Decode the byte array back into its opcode sequence. Used by
    /// both `run` and `disassemble` so the two never drift apart on
    /// how a malformed chunk's trailing bytes are handled.
    fn decode(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match self.code[offset] {
                TAG_EVAL_ITEM => {
                    let bytes = [self.code[offset + 1], self.code[offset + 2]];
                    ops.push(OpCode::EvalItem(u16::from_le_bytes(bytes)));
                    offset += 3;
                }
                TAG_RETURN => {
                    ops.push(OpCode::Return);
                    offset += 1;
                }
                other => unreachable!("unknown opcode tag {other}"),
            }
        }
        ops
    }
}

/// Compile a program's items into a chunk: one `EvalItem` per item, in
/// order, followed by a trailing `Return`.
pub fn compile(items: Vec<ProgramItem>) -> Chunk {
    let mut chunk = Chunk {
        code: Vec::new(),
        items,
    };
    let item_count = chunk.items.len();
    for index in 0..item_count {
        chunk.push_op(OpCode::EvalItem(
            u16::try_from(index).expect("program has more than u16::MAX top-level items"),
        ));
    }
    chunk.push_op(OpCode::Return);
    chunk
}

/// Execute a chunk against `env`, delegating each `EvalItem` to the
/// same statement/module evaluators the tree-walking interpreter uses.
/// Returns the last item's value, or `Value::Null` for an empty
/// program.
pub fn run(chunk: &Chunk, env: &Environment) -> Result<Value, RuntimeError> {
    let interpreter = Interpreter::new();
    let mut last = Value::Null;
    for op in chunk.decode() {
        match op {
            OpCode::EvalItem(index) => {
                let item = chunk.items.get(index as usize).unwrap_or_else(|| {
                    panic!("chunk references item index {index} outside its item table")
                });
                last = signal_to_result(interpreter.exec_item(item, env))?;
            }
            OpCode::Return => break,
        }
    }
    Ok(last)
}

/// Human-readable disassembly: one line per instruction, offset,
/// opcode name, item index (if any), and the referenced item's variant
/// tag. Plain data -- the caller decides whether to print it.
pub fn disassemble(chunk: &Chunk) -> String {
    let mut out = String::new();
    let mut offset = 0;
    for op in chunk.decode() {
        match op {
            OpCode::EvalItem(index) => {
                let tag = chunk
                    .items
                    .get(index as usize)
                    .map(item_tag)
                    .unwrap_or("<out of range>");
                let _ = writeln!(out, "{offset:04} EVAL_ITEM {index} ; {tag}");
                offset += 3;
            }
            OpCode::Return => {
                let _ = writeln!(out, "{offset:04} RETURN");
                offset += 1;
            }
        }
    }
    out
}

fn item_tag(item: &ProgramItem) -> &'static str {
    match item {
        ProgramItem::Package(_) => "Package",
        ProgramItem::Module(_) => "Module",
        ProgramItem::Statement(_) => "Statement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selene_parser::parse;

    fn compile_src(src: &str) -> Chunk {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        compile(program.items)
    }

    #[test]
    fn runs_items_in_order_and_returns_the_last_value() {
        let chunk = compile_src("let x = 1; let y = 2; x + y;");
        let env = Environment::root();
        let result = run(&chunk, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn empty_program_returns_null() {
        let chunk = compile_src("");
        let env = Environment::root();
        assert!(matches!(run(&chunk, &env).unwrap(), Value::Null));
    }

    #[test]
    fn disassembly_lists_one_eval_item_per_program_item_then_a_return() {
        let chunk = compile_src("let x = 1; let y = 2;");
        let text = disassemble(&chunk);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().contains("EVAL_ITEM 0"));
        assert!(lines.next().unwrap().contains("EVAL_ITEM 1"));
        assert!(lines.next().unwrap().contains("RETURN"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn recursive_function_call_matches_the_interpreter() {
        let chunk = compile_src(
            "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5);",
        );
        let env = Environment::root();
        let result = run(&chunk, &env).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 120.0));
    }
}
