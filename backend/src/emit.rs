// emit.rs — HLS C++ code generation for kernel modules
//
// Walks each function's operation graph and prints the synthesizable C++
// translation unit. Expressions and statements are claimed by two dispatch
// tables; anything unclaimed is reported, skipped, and emission continues
// so one run surfaces every unsupported construct.
//
// Preconditions: `module` is builder-produced or equivalently well formed
//                (operation arities match their kinds).
// Postconditions: returns `EmitResult`; the generated source is complete
//                 for every function that passed its structural checks.
// Failure modes: unsupported operations or types, structural violations,
//               and non-constant loop bounds produce diagnostics.
// Side effects: none.

use std::fmt::Write as _;

use crate::diag::{codes, DiagCode, DiagLevel, Diagnostic, Locus};
use crate::ir::{
    Bound, ConstValue, FloatPredicate, Function, IntPredicate, Module, Op, OpId, OpKind, Region,
    ScalarType, ValueDef, ValueId,
};

// ── Public types ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EmitResult {
    pub generated: GeneratedCode,
    pub diagnostics: Vec<Diagnostic>,
}

impl EmitResult {
    /// True when any error-level diagnostic was reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagLevel::Error)
    }
}

#[derive(Debug)]
pub struct GeneratedCode {
    pub hls_source: String,
}

// ── Public entry point ───────────────────────────────────────────────────

/// Emit a complete HLS C++ translation unit for `module`.
pub fn emit_module(module: &Module) -> EmitResult {
    let mut ctx = EmitCtx::new(module);
    ctx.emit_all();
    ctx.build_result()
}

// ── Internal context ─────────────────────────────────────────────────────

const INDENT_STEP: usize = 2;

const INCLUDES: [&str; 7] = [
    "ap_axi_sdata.h",
    "ap_fixed.h",
    "ap_int.h",
    "hls_math.h",
    "hls_stream.h",
    "math.h",
    "stdint.h",
];

struct EmitCtx<'a> {
    module: &'a Module,
    out: String,
    indent: usize,
    /// Value arena index to assigned C++ identifier. Constants are never
    /// entered here; they render as literals at every use site.
    names: Vec<Option<String>>,
    next_name: u32,
    diagnostics: Vec<Diagnostic>,
    current_func: String,
    /// Operation indices from the function body down to the op in hand.
    op_path: Vec<usize>,
}

impl<'a> EmitCtx<'a> {
    fn new(module: &'a Module) -> Self {
        EmitCtx {
            module,
            out: String::with_capacity(4096),
            indent: 0,
            names: vec![None; module.value_count()],
            next_name: 0,
            diagnostics: Vec::new(),
            current_func: String::new(),
            op_path: Vec::new(),
        }
    }

    fn build_result(self) -> EmitResult {
        EmitResult {
            generated: GeneratedCode {
                hls_source: self.out,
            },
            diagnostics: self.diagnostics,
        }
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    fn error(&mut self, code: DiagCode, locus: Locus, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(DiagLevel::Error, locus, message).with_code(code));
    }

    fn warning(&mut self, code: DiagCode, locus: Locus, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(DiagLevel::Warning, locus, message).with_code(code));
    }

    fn locus(&self) -> Locus {
        if self.op_path.is_empty() {
            Locus::Function(self.current_func.clone())
        } else {
            Locus::Op {
                func: self.current_func.clone(),
                path: self.op_path.clone(),
            }
        }
    }

    // ── Value naming ────────────────────────────────────────────────

    /// The C++ spelling of a value: its literal for constants, its
    /// assigned identifier otherwise, or empty if not yet declared.
    fn name_of(&self, value: ValueId) -> String {
        let info = self.module.value(value);
        if let ValueDef::OpResult { op, .. } = info.def {
            if let OpKind::Constant(constant) = &self.module.op(op).kind {
                return const_literal(*constant);
            }
        }
        self.names[value.0 as usize].clone().unwrap_or_default()
    }

    /// Assign the next sequential identifier to `value`. Pointer-declared
    /// values keep the `*` in the stored name so later references carry it.
    fn declare(&mut self, value: ValueId, is_ptr: bool) -> String {
        let mut name = String::new();
        if is_ptr {
            name.push('*');
        }
        let _ = write!(name, "val{}", self.next_name);
        self.next_name += 1;
        self.names[value.0 as usize] = Some(name.clone());
        name
    }

    /// Print a reference to `value`, declaring it first if this is its
    /// defining mention. Declarations carry the lowered element type.
    fn emit_value(&mut self, value: ValueId, is_ptr: bool) {
        let existing = self.name_of(value);
        if !existing.is_empty() {
            self.out.push_str(&existing);
            return;
        }
        let module = self.module;
        let elem = module.value(value).ty.elem();
        match elem {
            ScalarType::F32 => self.out.push_str("float "),
            ScalarType::F64 => self.out.push_str("double "),
            ScalarType::Index => self.out.push_str("int "),
            ScalarType::Int {
                width,
                unsigned: false,
            } => {
                let _ = write!(self.out, "ap_int<{}> ", width);
            }
            ScalarType::Int {
                width,
                unsigned: true,
            } => {
                let _ = write!(self.out, "ap_uint<{}> ", width);
            }
            ScalarType::F16 => {
                let locus = self.locus();
                let ty = module.value(value).ty.clone();
                self.error(
                    codes::E0702,
                    locus,
                    format!("type {} has no HLS C++ lowering", ty),
                );
            }
        }
        let name = self.declare(value, is_ptr);
        self.out.push_str(&name);
    }

    /// Print the static extents of `value`'s type, if any.
    fn emit_extents(&mut self, value: ValueId) {
        let shape = self.module.value(value).ty.shape();
        for extent in shape {
            let _ = write!(self.out, "[{}]", extent);
        }
    }

    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push(' ');
        }
    }

    // ── Module and function emission ────────────────────────────────

    fn emit_all(&mut self) {
        let module = self.module;
        self.emit_preamble();
        for func in &module.funcs {
            self.emit_function(func);
        }
    }

    fn emit_preamble(&mut self) {
        self.out.push_str("// Generated by khc (Kernel HLS Codegen).\n");
        self.out
            .push_str("// Target: Vivado HLS C++ translation unit.\n\n");
        for include in INCLUDES {
            let _ = writeln!(self.out, "#include <{}>", include);
        }
    }

    /// Emit one function, or nothing at all when a structural check fails.
    /// Function results are printed as trailing pointer parameters.
    fn emit_function(&mut self, func: &Function) {
        self.current_func = func.name.clone();
        self.op_path.clear();

        if func.body.blocks.len() != 1 {
            let count = func.body.blocks.len();
            self.error(
                codes::E0703,
                Locus::Function(func.name.clone()),
                format!("function body has {} blocks, expected exactly one", count),
            );
            return;
        }
        let module = self.module;
        let block = &func.body.blocks[0];
        let terminator = block.ops.last().map(|&id| module.op(id));
        let results: &[ValueId] = match terminator {
            Some(op) if matches!(op.kind, OpKind::Return) => &op.operands,
            _ => {
                self.error(
                    codes::E0704,
                    Locus::Function(func.name.clone()),
                    "function body does not end with a return terminator",
                );
                return;
            }
        };

        self.out.push('\n');
        let _ = write!(self.out, "void {}(\n", func.name);
        self.indent += INDENT_STEP;
        let inputs = &block.args;
        for (i, &arg) in inputs.iter().enumerate() {
            self.pad();
            self.emit_value(arg, false);
            self.emit_extents(arg);
            if i + 1 == inputs.len() && results.is_empty() {
                self.out.push('\n');
            } else {
                self.out.push_str(",\n");
            }
        }
        for (i, &result) in results.iter().enumerate() {
            self.pad();
            self.emit_value(result, true);
            self.emit_extents(result);
            if i + 1 == results.len() {
                self.out.push('\n');
            } else {
                self.out.push_str(",\n");
            }
        }
        self.indent -= INDENT_STEP;
        self.out.push_str(") {\n");
        self.emit_region(&func.body);
        self.out.push_str("}\n");
    }

    /// Emit the first block of a region one indent level deeper.
    fn emit_region(&mut self, region: &Region) {
        self.indent += INDENT_STEP;
        if let Some(block) = region.blocks.first() {
            for (index, &id) in block.ops.iter().enumerate() {
                self.op_path.push(index);
                self.emit_op(id);
                self.op_path.pop();
            }
        }
        self.indent -= INDENT_STEP;
    }

    // ── Operation dispatch ──────────────────────────────────────────

    fn emit_op(&mut self, id: OpId) {
        let module = self.module;
        let op = module.op(id);
        if self.try_emit_expr(op) {
            return;
        }
        if self.try_emit_stmt(op) {
            return;
        }
        let locus = self.locus();
        self.error(
            codes::E0701,
            locus,
            format!("unsupported operation '{}'", op.kind.name()),
        );
    }

    /// Expression table: value-producing operations and no-text forms.
    /// Returns false when the operation is not an expression.
    fn try_emit_expr(&mut self, op: &Op) -> bool {
        match &op.kind {
            OpKind::CmpF(pred) => {
                let syntax = float_cmp_syntax(*pred);
                self.emit_binary(op, syntax);
            }
            OpKind::AddF | OpKind::AddI => self.emit_binary(op, "+"),
            OpKind::SubF | OpKind::SubI => self.emit_binary(op, "-"),
            OpKind::MulF | OpKind::MulI => self.emit_binary(op, "*"),
            OpKind::DivF | OpKind::DivSI | OpKind::DivUI => self.emit_binary(op, "/"),
            OpKind::RemF | OpKind::RemSI | OpKind::RemUI => self.emit_binary(op, "%"),
            OpKind::CmpI(pred) => {
                let syntax = int_cmp_syntax(*pred);
                self.emit_binary(op, syntax);
            }
            OpKind::Xor => self.emit_binary(op, "^"),
            OpKind::And => self.emit_binary(op, "&"),
            OpKind::Or => self.emit_binary(op, "|"),
            OpKind::ShlI => self.emit_binary(op, "<<"),
            OpKind::ShrSI | OpKind::ShrUI => self.emit_binary(op, ">>"),
            OpKind::AbsF => self.emit_unary(op, "abs"),
            OpKind::CeilF => self.emit_unary(op, "ceil"),
            OpKind::NegF => self.emit_unary(op, "-"),
            OpKind::Cos => self.emit_unary(op, "cos"),
            OpKind::Sin => self.emit_unary(op, "sin"),
            OpKind::Tanh => self.emit_unary(op, "tanh"),
            OpKind::Sqrt => self.emit_unary(op, "sqrt"),
            OpKind::Rsqrt => self.emit_unary(op, "1.0 / sqrt"),
            OpKind::Exp => self.emit_unary(op, "exp"),
            OpKind::Exp2 => self.emit_unary(op, "exp2"),
            OpKind::Log => self.emit_unary(op, "log"),
            OpKind::Log2 => self.emit_unary(op, "log2"),
            OpKind::Log10 => self.emit_unary(op, "log10"),
            // Claimed without text: constants render at use sites,
            // terminators close constructs that print their own syntax.
            OpKind::Constant(_) | OpKind::Yield | OpKind::Return => {}
            _ => return false,
        }
        true
    }

    /// Statement table: memory and structured control operations.
    /// Returns false when the operation is not a statement.
    fn try_emit_stmt(&mut self, op: &Op) -> bool {
        match &op.kind {
            OpKind::Alloc => self.emit_alloc(op),
            OpKind::Load => self.emit_load(op),
            OpKind::Store => self.emit_store(op),
            OpKind::AffineFor { lower, upper, step } => {
                self.emit_affine_for(op, *lower, *upper, *step)
            }
            OpKind::AffineIf | OpKind::AffineParallel => {
                let locus = self.locus();
                self.warning(
                    codes::W0701,
                    locus,
                    format!("'{}' has no C++ lowering; operation skipped", op.kind.name()),
                );
            }
            _ => return false,
        }
        true
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn emit_binary(&mut self, op: &Op, syntax: &str) {
        self.pad();
        self.emit_value(op.results[0], false);
        let lhs = self.name_of(op.operands[0]);
        let rhs = self.name_of(op.operands[1]);
        let _ = writeln!(self.out, " = {} {} {};", lhs, syntax, rhs);
    }

    fn emit_unary(&mut self, op: &Op, syntax: &str) {
        self.pad();
        self.emit_value(op.results[0], false);
        let src = self.name_of(op.operands[0]);
        let _ = writeln!(self.out, " = {}({});", syntax, src);
    }

    // ── Statements ──────────────────────────────────────────────────

    fn emit_alloc(&mut self, op: &Op) {
        self.pad();
        self.emit_value(op.results[0], false);
        self.emit_extents(op.results[0]);
        self.out.push_str(";\n");
    }

    fn emit_load(&mut self, op: &Op) {
        self.pad();
        self.emit_value(op.results[0], false);
        self.out.push_str(" = ");
        let base = self.name_of(op.operands[0]);
        self.out.push_str(&base);
        for &index in &op.operands[1..] {
            let name = self.name_of(index);
            let _ = write!(self.out, "[{}]", name);
        }
        self.out.push_str(";\n");
    }

    fn emit_store(&mut self, op: &Op) {
        self.pad();
        let base = self.name_of(op.operands[1]);
        self.out.push_str(&base);
        for &index in &op.operands[2..] {
            let name = self.name_of(index);
            let _ = write!(self.out, "[{}]", name);
        }
        self.out.push_str(" = ");
        let value = self.name_of(op.operands[0]);
        self.out.push_str(&value);
        self.out.push_str(";\n");
    }

    fn emit_affine_for(&mut self, op: &Op, lower: Bound, upper: Bound, step: i64) {
        let (lb, ub) = match (lower, upper) {
            (Bound::Const(lb), Bound::Const(ub)) => (lb, ub),
            _ => {
                let locus = self.locus();
                self.error(
                    codes::E0705,
                    locus,
                    "loop bound is not a compile-time constant",
                );
                return;
            }
        };
        let induction = match op
            .regions
            .first()
            .and_then(|r| r.blocks.first())
            .and_then(|b| b.args.first())
        {
            Some(&iv) => iv,
            None => {
                let locus = self.locus();
                self.error(codes::E0703, locus, "loop carries no body block");
                return;
            }
        };
        self.pad();
        self.out.push_str("for (");
        self.emit_value(induction, false);
        let iv = self.name_of(induction);
        let _ = write!(self.out, " = {}; ", lb);
        let _ = write!(self.out, "{} < {}; ", iv, ub);
        let _ = writeln!(self.out, "{} += {}) {{", iv, step);
        self.emit_region(&op.regions[0]);
        self.pad();
        self.out.push_str("}\n");
    }
}

// ── Literal and operator tables ──────────────────────────────────────────

/// Render a constant. Whole floats keep one fractional digit so the C++
/// literal stays floating point.
fn const_literal(value: ConstValue) -> String {
    match value {
        ConstValue::Float(v) if v.is_finite() && v == v.trunc() => format!("{:.1}", v),
        ConstValue::Float(v) => format!("{}", v),
        ConstValue::Int(v) => format!("{}", v),
        ConstValue::Bool(b) => String::from(if b { "true" } else { "false" }),
    }
}

/// Ordered and unordered predicates collapse onto the same operator; the
/// distinction does not survive lowering to C++.
fn float_cmp_syntax(pred: FloatPredicate) -> &'static str {
    use FloatPredicate::*;
    match pred {
        Oeq | Ueq => "==",
        One | Une => "!=",
        Olt | Ult => "<",
        Ole | Ule => "<=",
        Ogt | Ugt => ">",
        Oge | Uge => ">=",
    }
}

fn int_cmp_syntax(pred: IntPredicate) -> &'static str {
    use IntPredicate::*;
    match pred {
        Eq => "==",
        Ne => "!=",
        Slt | Ult => "<",
        Sle | Ule => "<=",
        Sgt | Ugt => ">",
        Sge | Uge => ">=",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
