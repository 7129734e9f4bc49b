// ir.rs — Typed operation graph for kernel functions
//
// In-memory representation of lowered kernel modules: functions holding
// region-nested operations over SSA values. Values and operations live in
// per-module arenas and are referenced by index, so rewrites never chase
// pointers.
//
// Preconditions: none (types and builders only).
// Postconditions: builder-produced functions have single-block bodies whose
//                 loops carry exactly one induction argument.
// Failure modes: builder misuse (unbalanced loops) panics; there is no
//               partially-built state to recover.
// Side effects: none.

use std::fmt;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Unique identifier for a value within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Unique identifier for an operation within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

// ── Types ────────────────────────────────────────────────────────────────

/// Scalar element types carried by values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// Half-precision float. Representable in the graph, no C++ lowering.
    F16,
    F32,
    F64,
    /// Loop induction and memory indexing type.
    Index,
    /// Arbitrary-width integer.
    Int { width: u32, unsigned: bool },
}

impl ScalarType {
    /// Signed integer of the given bit width.
    pub fn int(width: u32) -> Self {
        ScalarType::Int {
            width,
            unsigned: false,
        }
    }

    /// Unsigned integer of the given bit width.
    pub fn uint(width: u32) -> Self {
        ScalarType::Int {
            width,
            unsigned: true,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::F16 => write!(f, "f16"),
            ScalarType::F32 => write!(f, "f32"),
            ScalarType::F64 => write!(f, "f64"),
            ScalarType::Index => write!(f, "index"),
            ScalarType::Int {
                width,
                unsigned: false,
            } => write!(f, "i{}", width),
            ScalarType::Int {
                width,
                unsigned: true,
            } => write!(f, "u{}", width),
        }
    }
}

/// The type of a value: a scalar or a statically shaped memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Scalar(ScalarType),
    MemRef { elem: ScalarType, shape: Vec<u64> },
}

impl Type {
    /// Shaped memory with static extents.
    pub fn memref(elem: ScalarType, shape: Vec<u64>) -> Self {
        Type::MemRef { elem, shape }
    }

    /// The scalar element type; the identity for scalars.
    pub fn elem(&self) -> ScalarType {
        match self {
            Type::Scalar(s) => *s,
            Type::MemRef { elem, .. } => *elem,
        }
    }

    /// Static extents; empty for scalars.
    pub fn shape(&self) -> &[u64] {
        match self {
            Type::Scalar(_) => &[],
            Type::MemRef { shape, .. } => shape,
        }
    }

    pub fn is_memref(&self) -> bool {
        matches!(self, Type::MemRef { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(s) => write!(f, "{}", s),
            Type::MemRef { elem, shape } => {
                write!(f, "{}", elem)?;
                for extent in shape {
                    write!(f, "[{}]", extent)?;
                }
                Ok(())
            }
        }
    }
}

// ── Constants and predicates ─────────────────────────────────────────────

/// A compile-time constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

/// Float comparison predicates. Ordered and unordered variants are kept
/// distinct in the graph even though they lower to the same C++ operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    Ueq,
    One,
    Une,
    Olt,
    Ult,
    Ole,
    Ule,
    Ogt,
    Ugt,
    Oge,
    Uge,
}

/// Integer comparison predicates. Signedness distinguishes the graph-level
/// semantics; the C++ operand types carry it after lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Ult,
    Sle,
    Ule,
    Sgt,
    Ugt,
    Sge,
    Uge,
}

/// A loop bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Const(i64),
    /// Computed at runtime. Recognized by the model, rejected by emission.
    Dynamic,
}

// ── Operations ───────────────────────────────────────────────────────────

/// The operation vocabulary.
///
/// Anything outside this vocabulary arrives as `Unclassified` and is
/// reported by the emission engine rather than silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    // Memory statements.
    Alloc,
    Load,
    Store,
    // Structured statements carrying a region.
    AffineFor {
        lower: Bound,
        upper: Bound,
        step: i64,
    },
    AffineIf,
    AffineParallel,
    // Unary float expressions.
    AbsF,
    CeilF,
    NegF,
    Cos,
    Sin,
    Tanh,
    Sqrt,
    Rsqrt,
    Exp,
    Exp2,
    Log,
    Log2,
    Log10,
    // Binary float expressions.
    CmpF(FloatPredicate),
    AddF,
    SubF,
    MulF,
    DivF,
    RemF,
    // Binary integer expressions.
    CmpI(IntPredicate),
    AddI,
    SubI,
    MulI,
    DivSI,
    RemSI,
    DivUI,
    RemUI,
    Xor,
    And,
    Or,
    ShlI,
    ShrSI,
    ShrUI,
    // Special forms.
    Constant(ConstValue),
    Yield,
    Return,
    /// An operation kind the back end does not know.
    Unclassified { name: String },
}

impl OpKind {
    /// Short name used in diagnostics and graph dumps.
    pub fn name(&self) -> &str {
        match self {
            OpKind::Alloc => "alloc",
            OpKind::Load => "load",
            OpKind::Store => "store",
            OpKind::AffineFor { .. } => "affine_for",
            OpKind::AffineIf => "affine_if",
            OpKind::AffineParallel => "affine_parallel",
            OpKind::AbsF => "absf",
            OpKind::CeilF => "ceilf",
            OpKind::NegF => "negf",
            OpKind::Cos => "cos",
            OpKind::Sin => "sin",
            OpKind::Tanh => "tanh",
            OpKind::Sqrt => "sqrt",
            OpKind::Rsqrt => "rsqrt",
            OpKind::Exp => "exp",
            OpKind::Exp2 => "exp2",
            OpKind::Log => "log",
            OpKind::Log2 => "log2",
            OpKind::Log10 => "log10",
            OpKind::CmpF(_) => "cmpf",
            OpKind::AddF => "addf",
            OpKind::SubF => "subf",
            OpKind::MulF => "mulf",
            OpKind::DivF => "divf",
            OpKind::RemF => "remf",
            OpKind::CmpI(_) => "cmpi",
            OpKind::AddI => "addi",
            OpKind::SubI => "subi",
            OpKind::MulI => "muli",
            OpKind::DivSI => "divsi",
            OpKind::RemSI => "remsi",
            OpKind::DivUI => "divui",
            OpKind::RemUI => "remui",
            OpKind::Xor => "xor",
            OpKind::And => "and",
            OpKind::Or => "or",
            OpKind::ShlI => "shli",
            OpKind::ShrSI => "shrsi",
            OpKind::ShrUI => "shrui",
            OpKind::Constant(_) => "constant",
            OpKind::Yield => "yield",
            OpKind::Return => "return",
            OpKind::Unclassified { name } => name,
        }
    }
}

/// One operation: a kind plus its operand, result, and region lists.
#[derive(Debug, Clone)]
pub struct Op {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub regions: Vec<Region>,
}

/// An ordered list of blocks attached to an operation or a function.
///
/// The supported lowering subset requires single-block regions; the model
/// allows more so that violations can be diagnosed rather than made
/// unrepresentable.
#[derive(Debug, Clone, Default)]
pub struct Region {
    pub blocks: Vec<Block>,
}

/// A basic block: leading arguments followed by an operation sequence.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub args: Vec<ValueId>,
    pub ops: Vec<OpId>,
}

/// Where a value is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// The `index`-th result of an operation.
    OpResult { op: OpId, index: u32 },
    /// A block argument: a function input or a loop induction variable.
    BlockArg,
}

/// Per-value metadata stored in the module arena.
#[derive(Debug, Clone)]
pub struct ValueInfo {
    pub ty: Type,
    pub def: ValueDef,
}

/// A kernel function: a name and a single-region body. The entry block's
/// arguments are the function inputs.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub body: Region,
}

// ── Module ───────────────────────────────────────────────────────────────

/// A compilation unit: functions plus the value and operation arenas they
/// index into.
#[derive(Debug, Default)]
pub struct Module {
    values: Vec<ValueInfo>,
    ops: Vec<Op>,
    pub funcs: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    pub fn value(&self, id: ValueId) -> &ValueInfo {
        &self.values[id.0 as usize]
    }

    pub fn op(&self, id: OpId) -> &Op {
        &self.ops[id.0 as usize]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueInfo { ty, def });
        id
    }

    fn push_op(&mut self, op: Op) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(op);
        id
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Module ({} functions, {} values, {} operations)",
            self.funcs.len(),
            self.values.len(),
            self.ops.len()
        )?;
        for func in &self.funcs {
            let inputs = func
                .body
                .blocks
                .first()
                .map(|b| b.args.len())
                .unwrap_or(0);
            writeln!(
                f,
                "  fn {}: {} inputs, {} blocks",
                func.name,
                inputs,
                func.body.blocks.len()
            )?;
        }
        Ok(())
    }
}

// ── Function builder ─────────────────────────────────────────────────────

/// Incrementally builds one function into a module.
///
/// Operations are appended to the innermost open block; `affine_for` opens
/// a loop body block and `end_for` closes it. `finish` installs the
/// function.
pub struct FuncBuilder<'m> {
    module: &'m mut Module,
    name: String,
    /// Open block stack; index 0 is the function body.
    blocks: Vec<Block>,
    /// Loop operations awaiting their body, parallel to `blocks[1..]`.
    open_loops: Vec<OpId>,
}

impl<'m> FuncBuilder<'m> {
    pub fn new(module: &'m mut Module, name: impl Into<String>) -> Self {
        FuncBuilder {
            module,
            name: name.into(),
            blocks: vec![Block::default()],
            open_loops: Vec::new(),
        }
    }

    fn current_block(&mut self) -> &mut Block {
        self.blocks.last_mut().expect("builder block stack underflow")
    }

    /// Add a function input of the given type.
    pub fn input(&mut self, ty: Type) -> ValueId {
        let id = self.module.new_value(ty, ValueDef::BlockArg);
        self.blocks[0].args.push(id);
        id
    }

    /// Append an arbitrary operation, allocating one result per type.
    pub fn op(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: Vec<Type>,
    ) -> Vec<ValueId> {
        let op_id = OpId(self.module.ops.len() as u32);
        let results: Vec<ValueId> = result_tys
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.module.new_value(
                    ty,
                    ValueDef::OpResult {
                        op: op_id,
                        index: index as u32,
                    },
                )
            })
            .collect();
        self.module.push_op(Op {
            kind,
            operands,
            results: results.clone(),
            regions: Vec::new(),
        });
        self.current_block().ops.push(op_id);
        results
    }

    pub fn const_float(&mut self, value: f64, ty: ScalarType) -> ValueId {
        self.op(
            OpKind::Constant(ConstValue::Float(value)),
            Vec::new(),
            vec![Type::Scalar(ty)],
        )[0]
    }

    pub fn const_int(&mut self, value: i64, ty: ScalarType) -> ValueId {
        self.op(
            OpKind::Constant(ConstValue::Int(value)),
            Vec::new(),
            vec![Type::Scalar(ty)],
        )[0]
    }

    pub fn const_index(&mut self, value: i64) -> ValueId {
        self.const_int(value, ScalarType::Index)
    }

    /// Append a binary expression. Comparisons produce `i1`; every other
    /// kind inherits its left operand's type.
    pub fn binary(&mut self, kind: OpKind, lhs: ValueId, rhs: ValueId) -> ValueId {
        let result_ty = match kind {
            OpKind::CmpF(_) | OpKind::CmpI(_) => Type::Scalar(ScalarType::int(1)),
            _ => self.module.value(lhs).ty.clone(),
        };
        self.op(kind, vec![lhs, rhs], vec![result_ty])[0]
    }

    /// Append a unary expression; the result inherits the operand's type.
    pub fn unary(&mut self, kind: OpKind, operand: ValueId) -> ValueId {
        let result_ty = self.module.value(operand).ty.clone();
        self.op(kind, vec![operand], vec![result_ty])[0]
    }

    pub fn alloc(&mut self, ty: Type) -> ValueId {
        self.op(OpKind::Alloc, Vec::new(), vec![ty])[0]
    }

    pub fn load(&mut self, base: ValueId, indices: &[ValueId]) -> ValueId {
        let elem = self.module.value(base).ty.elem();
        let mut operands = vec![base];
        operands.extend_from_slice(indices);
        self.op(OpKind::Load, operands, vec![Type::Scalar(elem)])[0]
    }

    pub fn store(&mut self, value: ValueId, base: ValueId, indices: &[ValueId]) {
        let mut operands = vec![value, base];
        operands.extend_from_slice(indices);
        self.op(OpKind::Store, operands, Vec::new());
    }

    /// Open a loop with constant bounds; returns the induction variable.
    pub fn affine_for(&mut self, lower: i64, upper: i64, step: i64) -> ValueId {
        self.affine_for_bounds(Bound::Const(lower), Bound::Const(upper), step)
    }

    /// Open a loop with explicit bounds; returns the induction variable.
    pub fn affine_for_bounds(&mut self, lower: Bound, upper: Bound, step: i64) -> ValueId {
        let op_id = OpId(self.module.ops.len() as u32);
        let induction = self
            .module
            .new_value(Type::Scalar(ScalarType::Index), ValueDef::BlockArg);
        self.module.push_op(Op {
            kind: OpKind::AffineFor { lower, upper, step },
            operands: Vec::new(),
            results: Vec::new(),
            regions: vec![Region::default()],
        });
        self.current_block().ops.push(op_id);
        self.open_loops.push(op_id);
        self.blocks.push(Block {
            args: vec![induction],
            ops: Vec::new(),
        });
        induction
    }

    /// Close the innermost open loop, appending its implicit yield.
    pub fn end_for(&mut self) {
        let loop_op = self
            .open_loops
            .pop()
            .expect("end_for without an open affine_for");
        let yield_id = self.module.push_op(Op {
            kind: OpKind::Yield,
            operands: Vec::new(),
            results: Vec::new(),
            regions: Vec::new(),
        });
        let mut body = self.blocks.pop().expect("builder block stack underflow");
        body.ops.push(yield_id);
        self.module.ops[loop_op.0 as usize].regions[0].blocks.push(body);
    }

    /// Append the function's return terminator.
    pub fn ret(&mut self, operands: &[ValueId]) {
        self.op(OpKind::Return, operands.to_vec(), Vec::new());
    }

    /// Install the finished function into the module.
    pub fn finish(self) {
        assert!(
            self.open_loops.is_empty(),
            "unclosed affine_for in function '{}'",
            self.name
        );
        let FuncBuilder {
            module,
            name,
            mut blocks,
            ..
        } = self;
        let body = blocks.pop().expect("builder block stack underflow");
        module.funcs.push(Function {
            name,
            body: Region { blocks: vec![body] },
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
