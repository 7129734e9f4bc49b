// emit_conformance.rs — End-to-end checks of the C++ emission engine.
//
// Each test builds a module through the public builder API and inspects the
// generated translation unit as text. Operator tables, naming order, and
// nesting structure are asserted on exact lines so any drift in emission
// shows up as a readable diff.

use khc::diag::{codes, DiagLevel, Locus};
use khc::emit::{emit_module, EmitResult};
use khc::ir::{Bound, FloatPredicate, FuncBuilder, IntPredicate, Module, OpKind, ScalarType, Type};

// ── Helpers ──────────────────────────────────────────────────────────────

fn emit_single(name: &str, build: impl FnOnce(&mut FuncBuilder)) -> EmitResult {
    let mut module = Module::new();
    let mut f = FuncBuilder::new(&mut module, name);
    build(&mut f);
    f.finish();
    emit_module(&module)
}

fn scalar(ty: ScalarType) -> Type {
    Type::Scalar(ty)
}

fn assert_has_line(src: &str, line: &str) {
    assert!(
        src.contains(line),
        "expected line {:?} in generated code, got:\n{}",
        line,
        src
    );
}

// ── Structure ────────────────────────────────────────────────────────────

#[test]
fn matmul_kernel_nests_three_loops() {
    let result = emit_single("matmul", |f| {
        let a = f.input(Type::memref(ScalarType::F32, vec![4, 4]));
        let b = f.input(Type::memref(ScalarType::F32, vec![4, 4]));
        let c = f.alloc(Type::memref(ScalarType::F32, vec![4, 4]));
        let i = f.affine_for(0, 4, 1);
        let j = f.affine_for(0, 4, 1);
        let k = f.affine_for(0, 4, 1);
        let lhs = f.load(a, &[i, k]);
        let rhs = f.load(b, &[k, j]);
        let prod = f.binary(OpKind::MulF, lhs, rhs);
        let acc = f.load(c, &[i, j]);
        let sum = f.binary(OpKind::AddF, acc, prod);
        f.store(sum, c, &[i, j]);
        f.end_for();
        f.end_for();
        f.end_for();
        f.ret(&[c]);
    });
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let src = &result.generated.hls_source;

    assert_has_line(
        src,
        "void matmul(\n  float val0[4][4],\n  float val1[4][4],\n  float *val2[4][4]\n) {\n",
    );
    assert_has_line(src, "  *val2[4][4];\n");
    assert_has_line(src, "  for (int val3 = 0; val3 < 4; val3 += 1) {\n");
    assert_has_line(src, "    for (int val4 = 0; val4 < 4; val4 += 1) {\n");
    assert_has_line(src, "      for (int val5 = 0; val5 < 4; val5 += 1) {\n");
    assert_has_line(src, "        float val6 = val0[val3][val5];\n");
    assert_has_line(src, "        float val9 = *val2[val3][val4];\n");
    assert_has_line(src, "        *val2[val3][val4] = val10;\n");
    // Braces close innermost first, then the function.
    assert_has_line(src, "      }\n    }\n  }\n}\n");
}

#[test]
fn preamble_appears_once_ahead_of_every_function() {
    let mut module = Module::new();
    for name in ["first", "second", "third"] {
        let mut f = FuncBuilder::new(&mut module, name);
        let x = f.input(scalar(ScalarType::F32));
        let y = f.unary(OpKind::Sqrt, x);
        f.ret(&[y]);
        f.finish();
    }
    let result = emit_module(&module);
    let src = &result.generated.hls_source;

    assert_eq!(src.matches("#include").count(), 7, "got:\n{}", src);
    let last_include = src.rfind("#include").unwrap();
    let first_fn = src.find("void first(").unwrap();
    assert!(last_include < first_fn, "includes must precede functions");
    // Declaration order is emission order.
    let second = src.find("void second(").unwrap();
    let third = src.find("void third(").unwrap();
    assert!(first_fn < second && second < third, "got:\n{}", src);
}

#[test]
fn scalar_result_becomes_pointer_parameter() {
    let result = emit_single("double_it", |f| {
        let x = f.input(scalar(ScalarType::F32));
        let y = f.binary(OpKind::AddF, x, x);
        f.ret(&[y]);
    });
    let src = &result.generated.hls_source;

    assert_has_line(src, "void double_it(\n  float val0,\n  float *val1\n) {\n");
    // The defining statement writes straight through the output pointer.
    assert_has_line(src, "  *val1 = val0 + val0;\n");
}

// ── Operator tables ──────────────────────────────────────────────────────

#[test]
fn binary_operator_table_is_exhaustive() {
    let result = emit_single("ops", |f| {
        let x = f.input(scalar(ScalarType::F32));
        let y = f.input(scalar(ScalarType::F32));
        let a = f.input(scalar(ScalarType::int(32)));
        let b = f.input(scalar(ScalarType::int(32)));
        let u = f.input(scalar(ScalarType::uint(32)));
        let w = f.input(scalar(ScalarType::uint(32)));
        f.binary(OpKind::SubF, x, y);
        f.binary(OpKind::DivF, x, y);
        f.binary(OpKind::RemF, x, y);
        f.binary(OpKind::AddI, a, b);
        f.binary(OpKind::SubI, a, b);
        f.binary(OpKind::MulI, a, b);
        f.binary(OpKind::DivSI, a, b);
        f.binary(OpKind::RemSI, a, b);
        f.binary(OpKind::DivUI, u, w);
        f.binary(OpKind::RemUI, u, w);
        f.binary(OpKind::Xor, a, b);
        f.binary(OpKind::And, a, b);
        f.binary(OpKind::Or, a, b);
        f.binary(OpKind::ShlI, a, b);
        f.binary(OpKind::ShrSI, a, b);
        f.binary(OpKind::ShrUI, u, w);
        f.ret(&[]);
    });
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let src = &result.generated.hls_source;

    assert_has_line(src, "  float val6 = val0 - val1;\n");
    assert_has_line(src, "  float val7 = val0 / val1;\n");
    assert_has_line(src, "  float val8 = val0 % val1;\n");
    assert_has_line(src, "  ap_int<32> val9 = val2 + val3;\n");
    assert_has_line(src, "  ap_int<32> val10 = val2 - val3;\n");
    assert_has_line(src, "  ap_int<32> val11 = val2 * val3;\n");
    assert_has_line(src, "  ap_int<32> val12 = val2 / val3;\n");
    assert_has_line(src, "  ap_int<32> val13 = val2 % val3;\n");
    assert_has_line(src, "  ap_uint<32> val14 = val4 / val5;\n");
    assert_has_line(src, "  ap_uint<32> val15 = val4 % val5;\n");
    assert_has_line(src, "  ap_int<32> val16 = val2 ^ val3;\n");
    assert_has_line(src, "  ap_int<32> val17 = val2 & val3;\n");
    assert_has_line(src, "  ap_int<32> val18 = val2 | val3;\n");
    assert_has_line(src, "  ap_int<32> val19 = val2 << val3;\n");
    assert_has_line(src, "  ap_int<32> val20 = val2 >> val3;\n");
    assert_has_line(src, "  ap_uint<32> val21 = val4 >> val5;\n");
}

#[test]
fn unary_math_calls_use_libm_names() {
    let result = emit_single("waves", |f| {
        let x = f.input(scalar(ScalarType::F64));
        f.unary(OpKind::AbsF, x);
        f.unary(OpKind::CeilF, x);
        f.unary(OpKind::NegF, x);
        f.unary(OpKind::Cos, x);
        f.unary(OpKind::Sin, x);
        f.unary(OpKind::Tanh, x);
        f.unary(OpKind::Sqrt, x);
        f.unary(OpKind::Rsqrt, x);
        f.unary(OpKind::Exp, x);
        f.unary(OpKind::Exp2, x);
        f.unary(OpKind::Log, x);
        f.unary(OpKind::Log2, x);
        f.unary(OpKind::Log10, x);
        f.ret(&[]);
    });
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let src = &result.generated.hls_source;

    assert_has_line(src, "  double val1 = abs(val0);\n");
    assert_has_line(src, "  double val2 = ceil(val0);\n");
    assert_has_line(src, "  double val3 = -(val0);\n");
    assert_has_line(src, "  double val4 = cos(val0);\n");
    assert_has_line(src, "  double val5 = sin(val0);\n");
    assert_has_line(src, "  double val6 = tanh(val0);\n");
    assert_has_line(src, "  double val7 = sqrt(val0);\n");
    assert_has_line(src, "  double val8 = 1.0 / sqrt(val0);\n");
    assert_has_line(src, "  double val9 = exp(val0);\n");
    assert_has_line(src, "  double val10 = exp2(val0);\n");
    assert_has_line(src, "  double val11 = log(val0);\n");
    assert_has_line(src, "  double val12 = log2(val0);\n");
    assert_has_line(src, "  double val13 = log10(val0);\n");
}

#[test]
fn float_predicates_collapse_to_six_operators() {
    use FloatPredicate::*;
    let result = emit_single("cmps", |f| {
        let x = f.input(scalar(ScalarType::F32));
        let y = f.input(scalar(ScalarType::F32));
        for pred in [Oeq, Ueq, One, Une, Olt, Ult, Ole, Ule, Ogt, Ugt, Oge, Uge] {
            f.binary(OpKind::CmpF(pred), x, y);
        }
        f.ret(&[]);
    });
    let src = &result.generated.hls_source;

    // Ordered and unordered forms render identically.
    assert_eq!(src.matches(" = val0 == val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 != val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 < val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 <= val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 > val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 >= val1;\n").count(), 2, "got:\n{}", src);
    // Every comparison result is a one-bit integer.
    assert_eq!(src.matches("ap_int<1> ").count(), 12, "got:\n{}", src);
}

#[test]
fn int_predicates_drop_signedness_in_syntax() {
    use IntPredicate::*;
    let result = emit_single("icmps", |f| {
        let a = f.input(scalar(ScalarType::int(16)));
        let b = f.input(scalar(ScalarType::int(16)));
        for pred in [Eq, Ne, Slt, Ult, Sle, Ule, Sgt, Ugt, Sge, Uge] {
            f.binary(OpKind::CmpI(pred), a, b);
        }
        f.ret(&[]);
    });
    let src = &result.generated.hls_source;

    assert_eq!(src.matches(" = val0 == val1;\n").count(), 1, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 != val1;\n").count(), 1, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 < val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 <= val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 > val1;\n").count(), 2, "got:\n{}", src);
    assert_eq!(src.matches(" = val0 >= val1;\n").count(), 2, "got:\n{}", src);
}

#[test]
fn constants_render_inline_at_every_use() {
    let result = emit_single("scaled", |f| {
        let x = f.input(scalar(ScalarType::F32));
        let gain = f.const_float(2.5, ScalarType::F32);
        let up = f.binary(OpKind::MulF, x, gain);
        f.binary(OpKind::AddF, up, gain);
        f.ret(&[]);
    });
    let src = &result.generated.hls_source;

    assert_has_line(src, "  float val1 = val0 * 2.5;\n");
    assert_has_line(src, "  float val2 = val1 + 2.5;\n");
    // A constant never claims a declaration of its own.
    assert!(!src.contains(" = 2.5;"), "got:\n{}", src);
    assert_eq!(src.matches("float val").count(), 3, "got:\n{}", src);
}

#[test]
fn whole_floats_keep_a_trailing_digit() {
    let result = emit_single("bias", |f| {
        let x = f.input(scalar(ScalarType::F32));
        let one = f.const_float(1.0, ScalarType::F32);
        let half = f.const_float(0.5, ScalarType::F32);
        let a = f.binary(OpKind::AddF, x, one);
        f.binary(OpKind::MulF, a, half);
        f.ret(&[]);
    });
    let src = &result.generated.hls_source;

    assert_has_line(src, " = val0 + 1.0;\n");
    assert_has_line(src, " = val1 * 0.5;\n");
}

// ── Diagnostics ──────────────────────────────────────────────────────────

#[test]
fn unclaimed_op_reports_nested_locus() {
    let result = emit_single("k", |f| {
        let x = f.input(scalar(ScalarType::F32));
        f.affine_for(0, 8, 1);
        f.op(
            OpKind::Unclassified {
                name: "custom.widget".into(),
            },
            vec![x],
            vec![scalar(ScalarType::F32)],
        );
        f.end_for();
        f.ret(&[]);
    });

    assert!(result.has_errors());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == Some(codes::E0701))
        .expect("E0701 not reported");
    assert_eq!(diag.level, DiagLevel::Error);
    assert_eq!(diag.message, "unsupported operation 'custom.widget'");
    match &diag.locus {
        Locus::Op { func, path } => {
            assert_eq!(func, "k");
            assert_eq!(path, &vec![0, 0]);
        }
        other => panic!("unexpected locus {:?}", other),
    }
    let rendered = format!("{}", diag);
    assert!(
        rendered.contains("error[E0701]:") && rendered.contains("at: fn k, op 0.0"),
        "got: {}",
        rendered
    );
}

#[test]
fn structured_constructs_warn_but_do_not_fail() {
    let result = emit_single("branchy", |f| {
        let x = f.input(scalar(ScalarType::F32));
        f.op(OpKind::AffineIf, vec![], vec![]);
        f.op(OpKind::AffineParallel, vec![], vec![]);
        f.unary(OpKind::Sqrt, x);
        f.ret(&[]);
    });

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.code == Some(codes::W0701))
        .collect();
    assert_eq!(warnings.len(), 2, "{:?}", result.diagnostics);
    assert!(warnings[0].message.contains("'affine_if'"));
    assert!(warnings[1].message.contains("'affine_parallel'"));
    // Emission continues past the skipped constructs.
    assert!(result.generated.hls_source.contains("sqrt(val0)"));
}

#[test]
fn dynamic_bound_fails_only_the_loop() {
    let result = emit_single("dyn", |f| {
        let x = f.input(scalar(ScalarType::F32));
        f.affine_for_bounds(Bound::Const(0), Bound::Dynamic, 1);
        f.end_for();
        let y = f.unary(OpKind::Sqrt, x);
        f.ret(&[y]);
    });

    assert!(result.has_errors());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == Some(codes::E0705))
        .expect("E0705 not reported");
    assert_eq!(diag.message, "loop bound is not a compile-time constant");
    let src = &result.generated.hls_source;
    assert!(!src.contains("for ("), "got:\n{}", src);
    // Identifiers are handed out in emission order, so the skipped loop's
    // induction variable never claims one.
    assert!(src.contains("*val1 = sqrt(val0);"), "got:\n{}", src);
}

#[test]
fn half_precision_value_reports_e0702() {
    let result = emit_single("half", |f| {
        let x = f.input(scalar(ScalarType::F16));
        f.ret(&[x]);
    });

    assert!(result.has_errors());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == Some(codes::E0702)));
}

#[test]
fn multi_block_function_is_skipped_whole() {
    let mut module = Module::new();
    let mut f = FuncBuilder::new(&mut module, "good");
    let x = f.input(scalar(ScalarType::F32));
    f.ret(&[x]);
    f.finish();
    let mut g = FuncBuilder::new(&mut module, "bad");
    g.input(scalar(ScalarType::F32));
    g.ret(&[]);
    g.finish();
    // Force a second block into the installed function body.
    module.funcs[1].body.blocks.push(Default::default());

    let result = emit_module(&module);
    assert!(result.has_errors());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == Some(codes::E0703))
        .expect("E0703 not reported");
    assert_eq!(diag.locus, Locus::Function("bad".into()));
    let src = &result.generated.hls_source;
    assert!(src.contains("void good("), "got:\n{}", src);
    assert!(!src.contains("void bad("), "got:\n{}", src);
}

#[test]
fn missing_return_terminator_reports_e0704() {
    let mut module = Module::new();
    let mut f = FuncBuilder::new(&mut module, "open_ended");
    let x = f.input(scalar(ScalarType::F32));
    f.unary(OpKind::Sqrt, x);
    f.finish();

    let result = emit_module(&module);
    assert!(result.has_errors());
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == Some(codes::E0704))
        .expect("E0704 not reported");
    assert_eq!(diag.locus, Locus::Function("open_ended".into()));
    assert!(!result.generated.hls_source.contains("void open_ended("));
}
