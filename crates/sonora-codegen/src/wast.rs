//! WebAssembly text backend
//!
//! Renders one generation unit as a WAST module: math imports, a typed
//! memory section, a JSON data segment, integer min/max/abs helpers and the
//! exported lifecycle functions. Every function takes the DSP structure's
//! base address as its first parameter; both heaps live inside that
//! structure in linear memory, integer heap first.
//!
//! A companion JavaScript helper artifact is rendered alongside the module
//! so a host can recover the structure size, the control path table and the
//! JSON description without parsing the data segment.

use crate::blocks::{BlockKind, BlockList};
use crate::compiler::{CompileStats, FbcCompiler};
use crate::error::{CodegenError, CodegenResult};
use crate::json::{self, UiDescription};
use crate::options::{CodegenOptions, MemoryMode, Precision, ScheduleMode};
use crate::stack::{format_int32, format_int64, format_real};
use crate::target::{CellIndex, TargetSyntax};
use crate::text::{escape_wast_string, line};
use sonora_bytecode::{Block, Factory, HeapKind, LifecyclePhase, Opcode};

/// Frames reserved per audio port when sizing internal memory
const AUDIO_BUFFER_FRAMES: usize = 8192;

/// Bytes per WebAssembly linear-memory page
const PAGE_SIZE: usize = 65536;

/// Math functions imported from the host as unary `(real) -> real`
const UNARY_IMPORTS: [&str; 12] = [
    "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "exp", "log", "log10",
];

/// Math functions imported from the host as binary `(real, real) -> real`
const BINARY_IMPORTS: [&str; 4] = ["atan2", "pow", "fmod", "remainder"];

/// Byte layout of the DSP structure in linear memory
///
/// The integer heap starts at byte 0 so the sample-rate and frame-count
/// cells sit at fixed small offsets; the real heap follows, aligned to its
/// cell size.
#[derive(Debug, Clone, Copy)]
pub struct WastLayout {
    /// Byte offset of the integer heap
    pub int_base: usize,
    /// Byte offset of the real heap
    pub real_base: usize,
    /// Byte size of one real-heap cell
    pub real_size: usize,
    /// Total structure size in bytes
    pub struct_size: usize,
}

impl WastLayout {
    /// Compute the layout for a factory at the given precision
    pub fn new(factory: &Factory, precision: Precision) -> Self {
        let real_size = precision.real_size();
        let int_bytes = 4 * factory.int_heap_size;
        let real_base = int_bytes.div_ceil(real_size) * real_size;
        Self {
            int_base: 0,
            real_base,
            real_size,
            struct_size: real_base + real_size * factory.real_heap_size,
        }
    }

    /// Byte offset of a real-heap cell
    pub fn real_byte(&self, cell: i32) -> i64 {
        self.real_base as i64 + self.real_size as i64 * cell as i64
    }

    /// Byte offset of an integer-heap cell
    pub fn int_byte(&self, cell: i32) -> i64 {
        self.int_base as i64 + 4 * cell as i64
    }
}

/// Linear-memory page count covering the structure, the audio buffers and
/// the JSON blob; monotone non-decreasing in each argument
pub fn memory_pages(struct_size: usize, ports: usize, json_len: usize) -> usize {
    (struct_size + ports * AUDIO_BUFFER_FRAMES * 4 + json_len) / PAGE_SIZE + 1
}

/// Move `(local ...)` declarations to the front of a rendered function body
///
/// WAST requires locals to be declared before any body expression. The
/// current lowerings keep all state in the two heaps and emit no locals of
/// their own; this pass keeps the compute body valid for any lowering that
/// introduces scratch locals. Relative order is preserved on both sides.
pub fn hoist_locals(body: &str) -> String {
    let mut locals = String::new();
    let mut rest = String::new();
    for text_line in body.lines() {
        let sink = if text_line.trim_start().starts_with("(local ") {
            &mut locals
        } else {
            &mut rest
        };
        sink.push_str(text_line);
        sink.push('\n');
    }
    locals.push_str(&rest);
    locals
}

/// WAST expression/statement syntax
pub struct WastTarget {
    precision: Precision,
    layout: WastLayout,
}

impl WastTarget {
    /// Create a target over the given structure layout
    pub fn new(precision: Precision, layout: WastLayout) -> Self {
        Self { precision, layout }
    }

    /// The WAST spelling of the working float type
    fn real_type(&self) -> &'static str {
        match self.precision {
            Precision::Double => "f64",
            _ => "f32",
        }
    }

    /// Log2 of the real cell size, for dynamic index scaling
    fn real_shift(&self) -> u32 {
        match self.precision {
            Precision::Double => 3,
            _ => 2,
        }
    }

    /// Byte address of a heap cell relative to the DSP base pointer
    fn address(&self, heap: HeapKind, index: &CellIndex) -> String {
        match (heap, index) {
            (HeapKind::Int, CellIndex::Literal(cell)) => format!(
                "(i32.add (get_local $dsp) (i32.const {}))",
                self.layout.int_byte(*cell)
            ),
            (HeapKind::Real, CellIndex::Literal(cell)) => format!(
                "(i32.add (get_local $dsp) (i32.const {}))",
                self.layout.real_byte(*cell)
            ),
            (HeapKind::Int, CellIndex::Dynamic(index)) => format!(
                "(i32.add (get_local $dsp) (i32.add (i32.const {}) (i32.shl {} (i32.const 2))))",
                self.layout.int_base, index
            ),
            (HeapKind::Real, CellIndex::Dynamic(index)) => format!(
                "(i32.add (get_local $dsp) (i32.add (i32.const {}) (i32.shl {} (i32.const {}))))",
                self.layout.real_base,
                index,
                self.real_shift()
            ),
        }
    }

    fn heap_type(&self, heap: HeapKind) -> &'static str {
        match heap {
            HeapKind::Real => self.real_type(),
            HeapKind::Int => "i32",
        }
    }

    /// Byte address of one sample in an input/output channel buffer
    fn sample_address(&self, buffers: &str, channel: i32, frame: &str) -> String {
        format!(
            "(i32.add (i32.load (i32.add (get_local ${}) (i32.const {}))) (i32.shl {} (i32.const 2)))",
            buffers,
            4 * channel,
            frame
        )
    }

    fn wasm_binop(&self, opcode: Opcode) -> Option<String> {
        let rt = self.real_type();
        Some(match opcode {
            Opcode::AddReal => format!("{}.add", rt),
            Opcode::SubReal => format!("{}.sub", rt),
            Opcode::MultReal => format!("{}.mul", rt),
            Opcode::DivReal => format!("{}.div", rt),
            Opcode::AddInt => "i32.add".to_string(),
            Opcode::SubInt => "i32.sub".to_string(),
            Opcode::MultInt => "i32.mul".to_string(),
            Opcode::DivInt => "i32.div_s".to_string(),
            Opcode::RemInt => "i32.rem_s".to_string(),
            Opcode::LshInt => "i32.shl".to_string(),
            Opcode::RshInt => "i32.shr_s".to_string(),
            Opcode::AndInt => "i32.and".to_string(),
            Opcode::OrInt => "i32.or".to_string(),
            Opcode::XorInt => "i32.xor".to_string(),
            Opcode::GTInt => "i32.gt_s".to_string(),
            Opcode::LTInt => "i32.lt_s".to_string(),
            Opcode::GEInt => "i32.ge_s".to_string(),
            Opcode::LEInt => "i32.le_s".to_string(),
            Opcode::EQInt => "i32.eq".to_string(),
            Opcode::NEInt => "i32.ne".to_string(),
            Opcode::GTReal => format!("{}.gt", rt),
            Opcode::LTReal => format!("{}.lt", rt),
            Opcode::GEReal => format!("{}.ge", rt),
            Opcode::LEReal => format!("{}.le", rt),
            Opcode::EQReal => format!("{}.eq", rt),
            Opcode::NEReal => format!("{}.ne", rt),
            _ => return None,
        })
    }
}

impl TargetSyntax for WastTarget {
    fn backend_name(&self) -> &'static str {
        "wast"
    }

    fn real_literal(&self, value: f64) -> String {
        format!(
            "({}.const {})",
            self.real_type(),
            format_real(value, self.precision)
        )
    }

    fn int32_literal(&self, value: i32) -> String {
        format!("(i32.const {})", format_int32(value))
    }

    fn int64_literal(&self, value: i64) -> String {
        format!("(i64.const {})", format_int64(value))
    }

    fn binop(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String> {
        let name = self.wasm_binop(opcode).ok_or_else(|| {
            CodegenError::Internal(format!("{:?} is not a binary operator", opcode))
        })?;
        Ok(format!("({} {} {})", name, v1, v2))
    }

    fn unary_call(&self, opcode: Opcode, value: &str) -> CodegenResult<String> {
        let rt = self.real_type();
        Ok(match opcode {
            Opcode::Abs => format!("(call $abs_i {})", value),
            Opcode::Absf => format!("({}.abs {})", rt, value),
            Opcode::Ceilf => format!("({}.ceil {})", rt, value),
            Opcode::Floorf => format!("({}.floor {})", rt, value),
            Opcode::Roundf => format!("({}.nearest {})", rt, value),
            Opcode::Sqrtf => format!("({}.sqrt {})", rt, value),
            Opcode::Acosf => format!("(call $acos {})", value),
            Opcode::Asinf => format!("(call $asin {})", value),
            Opcode::Atanf => format!("(call $atan {})", value),
            Opcode::Cosf => format!("(call $cos {})", value),
            Opcode::Coshf => format!("(call $cosh {})", value),
            Opcode::Expf => format!("(call $exp {})", value),
            Opcode::Logf => format!("(call $log {})", value),
            Opcode::Log10f => format!("(call $log10 {})", value),
            Opcode::Sinf => format!("(call $sin {})", value),
            Opcode::Sinhf => format!("(call $sinh {})", value),
            Opcode::Tanf => format!("(call $tan {})", value),
            Opcode::Tanhf => format!("(call $tanh {})", value),
            other => {
                return Err(CodegenError::Internal(format!(
                    "{:?} is not a unary math call",
                    other
                )))
            }
        })
    }

    fn binary_call(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String> {
        let rt = self.real_type();
        Ok(match opcode {
            Opcode::Atan2f => format!("(call $atan2 {} {})", v1, v2),
            Opcode::Powf => format!("(call $pow {} {})", v1, v2),
            Opcode::Fmodf => format!("(call $fmod {} {})", v1, v2),
            Opcode::RemReal => format!("(call $remainder {} {})", v1, v2),
            Opcode::Max => format!("(call $max_i {} {})", v1, v2),
            Opcode::Min => format!("(call $min_i {} {})", v1, v2),
            Opcode::Maxf => format!("({}.max {} {})", rt, v1, v2),
            Opcode::Minf => format!("({}.min {} {})", rt, v1, v2),
            other => {
                return Err(CodegenError::Internal(format!(
                    "{:?} is not a binary math call",
                    other
                )))
            }
        })
    }

    fn indexed(&self, base: i32, index: &str) -> String {
        format!("(i32.add (i32.const {}) {})", base, index)
    }

    fn load_heap(&self, heap: HeapKind, index: &CellIndex) -> String {
        format!("({}.load {})", self.heap_type(heap), self.address(heap, index))
    }

    fn store_heap(&self, heap: HeapKind, index: &CellIndex, value: &str) -> String {
        format!(
            "({}.store {} {})",
            self.heap_type(heap),
            self.address(heap, index),
            value
        )
    }

    fn load_input(&self, channel: i32, frame: &str) -> String {
        let load = format!(
            "(f32.load {})",
            self.sample_address("inputs", channel, frame)
        );
        match self.precision {
            Precision::Double => format!("(f64.promote_f32 {})", load),
            _ => load,
        }
    }

    fn store_output(&self, channel: i32, frame: &str, value: &str) -> String {
        let sample = match self.precision {
            Precision::Double => format!("(f32.demote_f64 {})", value),
            _ => value.to_string(),
        };
        format!(
            "(f32.store {} {})",
            self.sample_address("outputs", channel, frame),
            sample
        )
    }

    fn cast_real(&self, value: &str) -> String {
        format!("({}.convert_i32_s {})", self.real_type(), value)
    }

    fn cast_int(&self, value: &str) -> String {
        format!("(i32.trunc_{}_s {})", self.real_type(), value)
    }

    fn bitcast_real(&self, value: &str) -> CodegenResult<String> {
        match self.precision {
            Precision::Single => Ok(format!("(f32.reinterpret_i32 {})", value)),
            // A 64-bit real has no 32-bit reinterpretation
            _ => Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::BitcastReal,
                backend: self.backend_name(),
            }),
        }
    }

    fn bitcast_int(&self, value: &str) -> CodegenResult<String> {
        match self.precision {
            Precision::Single => Ok(format!("(i32.reinterpret_f32 {})", value)),
            _ => Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::BitcastInt,
                backend: self.backend_name(),
            }),
        }
    }

    fn select(&self, _opcode: Opcode, cond: &str, then_value: &str, else_value: &str) -> String {
        format!("(select {} {} {})", then_value, else_value, cond)
    }

    fn cond_transfer(
        &self,
        cond: &str,
        true_label: usize,
        true_kind: BlockKind,
        _false_label: usize,
    ) -> CodegenResult<String> {
        // Only loop blocks carry a structural label here; a br_if to any
        // other block would reference a label the module never defines
        if true_kind != BlockKind::Loop {
            return Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::CondBranch,
                backend: self.backend_name(),
            });
        }
        // The false edge is the structural fall-through
        Ok(format!("(br_if $block{} {})", true_label, cond))
    }
}

/// Escape text for a single-quoted JavaScript string literal
fn js_quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Whole-unit WAST module renderer
pub struct WastGenerator {
    options: CodegenOptions,
}

impl WastGenerator {
    /// Create a generator with the given configuration
    pub fn new(options: CodegenOptions) -> Self {
        Self { options }
    }

    fn check_options(&self) -> CodegenResult<()> {
        if self.options.precision == Precision::Quad {
            return Err(CodegenError::UnsupportedOption(
                "quad precision is not representable in 32-bit linear memory".to_string(),
            ));
        }
        match self.options.schedule {
            ScheduleMode::Scalar => Ok(()),
            ScheduleMode::Vector => Err(CodegenError::UnsupportedOption(
                "vector scheduling has no text lowering".to_string(),
            )),
            ScheduleMode::Parallel => Err(CodegenError::UnsupportedOption(
                "parallel scheduling has no text lowering".to_string(),
            )),
        }
    }

    fn render_list(blocks: &BlockList, out: &mut String, indent: usize) -> CodegenResult<()> {
        for block in blocks.iter() {
            match block.kind {
                BlockKind::Plain => {
                    for statement in &block.statements {
                        line(out, indent, statement)?;
                    }
                }
                BlockKind::Loop => {
                    line(out, indent, &format!("(loop $block{}", block.label))?;
                    for statement in &block.statements {
                        line(out, indent + 1, statement)?;
                    }
                    line(out, indent, ")")?;
                }
            }
        }
        Ok(())
    }

    fn render_phase_func(
        &self,
        name: &str,
        params: &str,
        prelude: Option<&str>,
        block: &Block,
        target: &WastTarget,
        text: &mut String,
        stats: &mut CompileStats,
    ) -> CodegenResult<()> {
        line(
            text,
            1,
            &format!("(func ${} (export \"{}\") {}", name, name, params),
        )?;
        if let Some(statement) = prelude {
            line(text, 2, statement)?;
        }
        let mut compiler = FbcCompiler::new(target);
        compiler.compile_phase(block)?;
        Self::render_list(compiler.blocks(), text, 2)?;
        stats.merge(compiler.into_stats());
        line(text, 1, ")")?;
        Ok(())
    }

    fn render_int_helpers(text: &mut String) -> CodegenResult<()> {
        line(
            text,
            1,
            "(func $min_i (param $v1 i32) (param $v2 i32) (result i32)",
        )?;
        line(
            text,
            2,
            "(select (get_local $v1) (get_local $v2) (i32.lt_s (get_local $v1) (get_local $v2)))",
        )?;
        line(text, 1, ")")?;
        line(
            text,
            1,
            "(func $max_i (param $v1 i32) (param $v2 i32) (result i32)",
        )?;
        line(
            text,
            2,
            "(select (get_local $v1) (get_local $v2) (i32.gt_s (get_local $v1) (get_local $v2)))",
        )?;
        line(text, 1, ")")?;
        line(text, 1, "(func $abs_i (param $v i32) (result i32)")?;
        line(
            text,
            2,
            "(select (i32.sub (i32.const 0) (get_local $v)) (get_local $v) (i32.lt_s (get_local $v) (i32.const 0)))",
        )?;
        line(text, 1, ")")?;
        Ok(())
    }

    fn render_helper_artifact(
        factory: &Factory,
        layout: &WastLayout,
        description: &UiDescription,
        out: &mut String,
    ) -> CodegenResult<()> {
        let name = &factory.name;
        line(out, 0, &format!("function getSize{}() {{", name))?;
        line(out, 1, &format!("return {};", layout.struct_size))?;
        line(out, 0, "}")?;
        line(out, 0, "")?;
        line(out, 0, &format!("function getPathTable{}() {{", name))?;
        line(out, 1, "var pathTable = [];")?;
        for (path, index) in &description.path_table {
            line(
                out,
                1,
                &format!("pathTable[\"{}\"] = {};", path, index),
            )?;
        }
        line(out, 1, "return pathTable;")?;
        line(out, 0, "}")?;
        line(out, 0, "")?;
        line(out, 0, &format!("function getJSON{}() {{", name))?;
        line(out, 1, &format!("return '{}';", js_quote(&description.json)))?;
        line(out, 0, "}")?;
        line(out, 0, "")?;
        line(out, 0, &format!("function metadata{}(m) {{", name))?;
        for declaration in &factory.meta_block {
            line(
                out,
                1,
                &format!(
                    "m.declare(\"{}\", \"{}\");",
                    declaration.key, declaration.value
                ),
            )?;
        }
        line(out, 0, "}")?;
        Ok(())
    }

    /// Render the module for `factory` into `module_out` and the companion
    /// helper artifact into `helper_out`
    ///
    /// The configuration is validated first; on a configuration error both
    /// sinks are left untouched. Returns the coverage accounting aggregated
    /// over every compiled phase.
    pub fn generate<W: std::fmt::Write>(
        &self,
        factory: &Factory,
        module_out: &mut W,
        helper_out: &mut W,
    ) -> CodegenResult<CompileStats> {
        self.check_options()?;

        let layout = WastLayout::new(factory, self.options.precision);
        let target = WastTarget::new(self.options.precision, layout);
        let rt = target.real_type();
        let description = json::describe(factory, |cell| layout.real_byte(cell) as i32);
        let mut stats = CompileStats::default();
        let mut text = String::new();

        line(&mut text, 0, "(module")?;

        for name in UNARY_IMPORTS {
            line(
                &mut text,
                1,
                &format!(
                    "(import \"env\" \"{}\" (func ${} (param {}) (result {})))",
                    name, name, rt, rt
                ),
            )?;
        }
        for name in BINARY_IMPORTS {
            line(
                &mut text,
                1,
                &format!(
                    "(import \"env\" \"{}\" (func ${} (param {} {}) (result {})))",
                    name, name, rt, rt, rt
                ),
            )?;
        }

        match self.options.memory {
            MemoryMode::Internal => {
                let pages =
                    memory_pages(layout.struct_size, factory.num_ports(), description.json.len());
                line(
                    &mut text,
                    1,
                    &format!("(memory (export \"memory\") {})", pages),
                )?;
            }
            MemoryMode::External => {
                line(&mut text, 1, "(import \"memory\" \"memory\" (memory $0 0))")?;
            }
        }

        line(
            &mut text,
            1,
            &format!(
                "(data (i32.const 0) \"{}\\00\")",
                escape_wast_string(&description.json)
            ),
        )?;

        Self::render_int_helpers(&mut text)?;

        line(
            &mut text,
            1,
            "(func $getNumInputs (export \"getNumInputs\") (param $dsp i32) (result i32)",
        )?;
        line(&mut text, 2, &format!("(i32.const {})", factory.num_inputs))?;
        line(&mut text, 1, ")")?;
        line(
            &mut text,
            1,
            "(func $getNumOutputs (export \"getNumOutputs\") (param $dsp i32) (result i32)",
        )?;
        line(&mut text, 2, &format!("(i32.const {})", factory.num_outputs))?;
        line(&mut text, 1, ")")?;
        line(
            &mut text,
            1,
            "(func $getSampleRate (export \"getSampleRate\") (param $dsp i32) (result i32)",
        )?;
        line(
            &mut text,
            2,
            &format!(
                "(i32.load (i32.add (get_local $dsp) (i32.const {})))",
                layout.int_byte(factory.sr_offset as i32)
            ),
        )?;
        line(&mut text, 1, ")")?;

        let store_sr = format!(
            "(i32.store (i32.add (get_local $dsp) (i32.const {})) (get_local $sample_rate))",
            layout.int_byte(factory.sr_offset as i32)
        );
        let lifecycle: [(LifecyclePhase, &str, Option<&str>); 4] = [
            (
                LifecyclePhase::ClassInit,
                "(param $dsp i32) (param $sample_rate i32)",
                None,
            ),
            (
                LifecyclePhase::InstanceConstants,
                "(param $dsp i32) (param $sample_rate i32)",
                Some(store_sr.as_str()),
            ),
            (
                LifecyclePhase::InstanceResetUserInterface,
                "(param $dsp i32)",
                None,
            ),
            (LifecyclePhase::InstanceClear, "(param $dsp i32)", None),
        ];
        for (phase, params, prelude) in lifecycle {
            let block = factory.code_block(phase).ok_or_else(|| {
                CodegenError::Internal(format!("{:?} has no bytecode block", phase))
            })?;
            self.render_phase_func(
                phase.method_name(),
                params,
                prelude,
                block,
                &target,
                &mut text,
                &mut stats,
            )?;
        }

        line(
            &mut text,
            1,
            "(func $instanceInit (export \"instanceInit\") (param $dsp i32) (param $sample_rate i32)",
        )?;
        line(
            &mut text,
            2,
            "(call $instanceConstants (get_local $dsp) (get_local $sample_rate))",
        )?;
        line(
            &mut text,
            2,
            "(call $instanceResetUserInterface (get_local $dsp))",
        )?;
        line(&mut text, 2, "(call $instanceClear (get_local $dsp))")?;
        line(&mut text, 1, ")")?;

        line(
            &mut text,
            1,
            "(func $init (export \"init\") (param $dsp i32) (param $sample_rate i32)",
        )?;
        line(
            &mut text,
            2,
            "(call $classInit (get_local $dsp) (get_local $sample_rate))",
        )?;
        line(
            &mut text,
            2,
            "(call $instanceInit (get_local $dsp) (get_local $sample_rate))",
        )?;
        line(&mut text, 1, ")")?;

        line(
            &mut text,
            1,
            &format!(
                "(func $setParamValue (export \"setParamValue\") (param $dsp i32) (param $index i32) (param $value {})",
                rt
            ),
        )?;
        line(
            &mut text,
            2,
            &format!(
                "({}.store (i32.add (get_local $dsp) (get_local $index)) (get_local $value))",
                rt
            ),
        )?;
        line(&mut text, 1, ")")?;
        line(
            &mut text,
            1,
            &format!(
                "(func $getParamValue (export \"getParamValue\") (param $dsp i32) (param $index i32) (result {})",
                rt
            ),
        )?;
        line(
            &mut text,
            2,
            &format!(
                "({}.load (i32.add (get_local $dsp) (get_local $index)))",
                rt
            ),
        )?;
        line(&mut text, 1, ")")?;

        line(
            &mut text,
            1,
            "(func $compute (export \"compute\") (param $dsp i32) (param $count i32) (param $inputs i32) (param $outputs i32)",
        )?;
        // Zero frames is a documented no-op
        line(
            &mut text,
            2,
            "(if (i32.eqz (get_local $count)) (then (return)))",
        )?;
        line(
            &mut text,
            2,
            &format!(
                "(i32.store (i32.add (get_local $dsp) (i32.const {})) (get_local $count))",
                layout.int_byte(factory.count_offset as i32)
            ),
        )?;

        // The loop-control prelude and the per-sample block share one
        // compiler so branch labels stay consistent across both
        let mut compiler = FbcCompiler::new(&target);
        compiler.compile_phase(&factory.compute_block)?;
        compiler.compile_phase_continued(&factory.compute_dsp_block)?;
        let mut body = String::new();
        Self::render_list(compiler.blocks(), &mut body, 2)?;
        stats.merge(compiler.into_stats());
        text.push_str(&hoist_locals(&body));

        line(&mut text, 1, ")")?;
        line(&mut text, 0, ")")?;

        let mut helper = String::new();
        Self::render_helper_artifact(factory, &layout, &description, &mut helper)?;

        module_out.write_str(&text)?;
        helper_out.write_str(&helper)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(int_cells: usize, real_cells: usize, precision: Precision) -> WastLayout {
        let mut factory = Factory::new("t");
        factory.int_heap_size = int_cells;
        factory.real_heap_size = real_cells;
        WastLayout::new(&factory, precision)
    }

    #[test]
    fn test_layout_aligns_real_heap() {
        let single = layout(3, 4, Precision::Single);
        assert_eq!(single.real_base, 12);
        assert_eq!(single.struct_size, 28);

        let double = layout(3, 4, Precision::Double);
        assert_eq!(double.real_base, 16);
        assert_eq!(double.struct_size, 48);
    }

    #[test]
    fn test_memory_pages_monotone() {
        let base = memory_pages(1024, 2, 512);
        assert!(memory_pages(2048, 2, 512) >= base);
        assert!(memory_pages(1024, 3, 512) >= base);
        assert!(memory_pages(1024, 2, 4096) >= base);
        // One extra page always covers the remainder
        assert_eq!(memory_pages(0, 0, 0), 1);
    }

    #[test]
    fn test_literal_types_follow_precision() {
        let single = WastTarget::new(Precision::Single, layout(1, 1, Precision::Single));
        assert_eq!(single.real_literal(0.5), "(f32.const 0.5)");
        let double = WastTarget::new(Precision::Double, layout(1, 1, Precision::Double));
        assert_eq!(double.real_literal(0.5), "(f64.const 0.5)");
        assert_eq!(double.int32_literal(-3), "(i32.const -3)");
    }

    #[test]
    fn test_heap_addresses_offset_by_layout() {
        let target = WastTarget::new(Precision::Single, layout(2, 4, Precision::Single));
        assert_eq!(
            target.load_heap(HeapKind::Int, &CellIndex::Literal(1)),
            "(i32.load (i32.add (get_local $dsp) (i32.const 4)))"
        );
        assert_eq!(
            target.load_heap(HeapKind::Real, &CellIndex::Literal(1)),
            "(f32.load (i32.add (get_local $dsp) (i32.const 12)))"
        );
    }

    #[test]
    fn test_dynamic_index_is_scaled() {
        let target = WastTarget::new(Precision::Double, layout(0, 4, Precision::Double));
        let cell = CellIndex::Dynamic("(get_local $i)".to_string());
        assert_eq!(
            target.load_heap(HeapKind::Real, &cell),
            "(f64.load (i32.add (get_local $dsp) (i32.add (i32.const 0) (i32.shl (get_local $i) (i32.const 3)))))"
        );
    }

    #[test]
    fn test_double_bitcast_rejected() {
        let target = WastTarget::new(Precision::Double, layout(1, 1, Precision::Double));
        assert!(matches!(
            target.bitcast_int("(f64.const 0)"),
            Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::BitcastInt,
                backend: "wast",
            })
        ));
    }

    #[test]
    fn test_cond_transfer_requires_a_loop_target() {
        let target = WastTarget::new(Precision::Single, layout(1, 1, Precision::Single));
        assert_eq!(
            target
                .cond_transfer("(i32.const 1)", 2, BlockKind::Loop, 3)
                .unwrap(),
            "(br_if $block2 (i32.const 1))"
        );
        // A plain block never defines a label a br_if could reference
        assert!(matches!(
            target.cond_transfer("(i32.const 1)", 0, BlockKind::Plain, 1),
            Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::CondBranch,
                backend: "wast",
            })
        ));
    }

    #[test]
    fn test_hoist_locals_preserves_order() {
        let body = "    (nop)\n    (local $a i32)\n    (drop)\n    (local $b f32)\n";
        assert_eq!(
            hoist_locals(body),
            "    (local $a i32)\n    (local $b f32)\n    (nop)\n    (drop)\n"
        );
    }

    #[test]
    fn test_generate_smoke() {
        let mut factory = Factory::new("noop");
        factory.int_heap_size = 2;
        factory.real_heap_size = 2;
        factory.count_offset = 1;

        let generator = WastGenerator::new(CodegenOptions::default());
        let mut module = String::new();
        let mut helper = String::new();
        generator.generate(&factory, &mut module, &mut helper).unwrap();

        assert!(module.starts_with("(module\n"));
        assert!(module.contains("(memory (export \"memory\")"));
        assert!(module.contains("\\00\")"));
        assert!(module.contains("(func $compute (export \"compute\")"));
        assert!(module.contains("(if (i32.eqz (get_local $count)) (then (return)))"));
        assert!(module.contains("(import \"env\" \"pow\""));
        assert!(helper.contains("function getSizenoop() {"));
        assert!(helper.contains("function getJSONnoop() {"));
    }

    #[test]
    fn test_external_memory_is_imported() {
        let options = CodegenOptions {
            memory: MemoryMode::External,
            ..CodegenOptions::default()
        };
        let generator = WastGenerator::new(options);
        let mut module = String::new();
        let mut helper = String::new();
        generator
            .generate(&Factory::new("ext"), &mut module, &mut helper)
            .unwrap();
        assert!(module.contains("(import \"memory\" \"memory\" (memory $0 0))"));
        assert!(!module.contains("(memory (export"));
    }

    #[test]
    fn test_quad_precision_rejected_before_output() {
        let options = CodegenOptions {
            precision: Precision::Quad,
            ..CodegenOptions::default()
        };
        let generator = WastGenerator::new(options);
        let mut module = String::new();
        let mut helper = String::new();
        let err = generator.generate(&Factory::new("q"), &mut module, &mut helper);
        assert!(matches!(err, Err(CodegenError::UnsupportedOption(_))));
        assert!(module.is_empty());
        assert!(helper.is_empty());
    }
}
