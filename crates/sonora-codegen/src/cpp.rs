//! C++ class backend
//!
//! Renders one generation unit as a self-contained C++ class: two flat heap
//! arrays, virtual lifecycle methods, declarative UI/metadata methods and a
//! `compute` entry point. Control flow between emitted blocks uses labels
//! and gotos, matching the flat block list directly.

use crate::blocks::{BlockKind, BlockList};
use crate::compiler::{CompileStats, FbcCompiler};
use crate::error::{CodegenError, CodegenResult};
use crate::options::{CodegenOptions, Precision, ScheduleMode};
use crate::stack::{format_int32, format_int64, format_real};
use crate::target::{CellIndex, TargetSyntax};
use crate::text::line;
use sonora_bytecode::{Block, Factory, HeapKind, LifecyclePhase, Opcode, UiInstruction};

/// C++ expression/statement syntax
pub struct CppTarget {
    precision: Precision,
}

impl CppTarget {
    /// Create a target with the given working float precision
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    /// The C++ spelling of the working float type
    pub fn real_type(&self) -> &'static str {
        match self.precision {
            Precision::Single => "float",
            Precision::Double => "double",
            Precision::Quad => "long double",
        }
    }

    fn heap_name(heap: HeapKind) -> &'static str {
        match heap {
            HeapKind::Real => "fRealHeap",
            HeapKind::Int => "fIntHeap",
        }
    }

    fn cell(heap: HeapKind, index: &CellIndex) -> String {
        match index {
            CellIndex::Literal(offset) => format!("{}[{}]", Self::heap_name(heap), offset),
            CellIndex::Dynamic(expr) => format!("{}[{}]", Self::heap_name(heap), expr),
        }
    }

    fn math_name(opcode: Opcode) -> Option<&'static str> {
        Some(match opcode {
            Opcode::Abs => "std::abs",
            Opcode::Absf => "std::fabs",
            Opcode::Acosf => "std::acos",
            Opcode::Asinf => "std::asin",
            Opcode::Atanf => "std::atan",
            Opcode::Ceilf => "std::ceil",
            Opcode::Cosf => "std::cos",
            Opcode::Coshf => "std::cosh",
            Opcode::Expf => "std::exp",
            Opcode::Floorf => "std::floor",
            Opcode::Logf => "std::log",
            Opcode::Log10f => "std::log10",
            Opcode::Roundf => "std::round",
            Opcode::Sinf => "std::sin",
            Opcode::Sinhf => "std::sinh",
            Opcode::Sqrtf => "std::sqrt",
            Opcode::Tanf => "std::tan",
            Opcode::Tanhf => "std::tanh",
            Opcode::Atan2f => "std::atan2",
            Opcode::Fmodf => "std::fmod",
            Opcode::Powf => "std::pow",
            Opcode::RemReal => "std::remainder",
            Opcode::Max | Opcode::Maxf => "std::max",
            Opcode::Min | Opcode::Minf => "std::min",
            _ => return None,
        })
    }
}

impl TargetSyntax for CppTarget {
    fn backend_name(&self) -> &'static str {
        "cpp"
    }

    fn real_literal(&self, value: f64) -> String {
        format_real(value, self.precision)
    }

    fn int32_literal(&self, value: i32) -> String {
        format_int32(value)
    }

    fn int64_literal(&self, value: i64) -> String {
        format_int64(value)
    }

    fn binop(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String> {
        let symbol = opcode.binop_symbol().ok_or_else(|| {
            CodegenError::Internal(format!("{:?} is not an infix operator", opcode))
        })?;
        Ok(format!("({} {} {})", v1, symbol, v2))
    }

    fn unary_call(&self, opcode: Opcode, value: &str) -> CodegenResult<String> {
        let name = Self::math_name(opcode).ok_or_else(|| {
            CodegenError::Internal(format!("{:?} is not a math call", opcode))
        })?;
        Ok(format!("{}({})", name, value))
    }

    fn binary_call(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String> {
        let name = Self::math_name(opcode).ok_or_else(|| {
            CodegenError::Internal(format!("{:?} is not a math call", opcode))
        })?;
        Ok(format!("{}({}, {})", name, v1, v2))
    }

    fn indexed(&self, base: i32, index: &str) -> String {
        format!("{}+{}", base, index)
    }

    fn load_heap(&self, heap: HeapKind, index: &CellIndex) -> String {
        Self::cell(heap, index)
    }

    fn store_heap(&self, heap: HeapKind, index: &CellIndex, value: &str) -> String {
        format!("{} = {};", Self::cell(heap, index), value)
    }

    fn load_input(&self, channel: i32, frame: &str) -> String {
        format!("{}(inputs[{}][{}])", self.real_type(), channel, frame)
    }

    fn store_output(&self, channel: i32, frame: &str, value: &str) -> String {
        format!("outputs[{}][{}] = sample_t({});", channel, frame, value)
    }

    fn cast_real(&self, value: &str) -> String {
        format!("{}({})", self.real_type(), value)
    }

    fn cast_int(&self, value: &str) -> String {
        format!("int({})", value)
    }

    fn bitcast_real(&self, value: &str) -> CodegenResult<String> {
        Ok(format!(
            "(*reinterpret_cast<{}*>(&{}))",
            self.real_type(),
            value
        ))
    }

    fn bitcast_int(&self, value: &str) -> CodegenResult<String> {
        Ok(format!("(*reinterpret_cast<int*>(&{}))", value))
    }

    fn select(&self, _opcode: Opcode, cond: &str, then_value: &str, else_value: &str) -> String {
        format!("(({}) ? {} : {})", cond, then_value, else_value)
    }

    // A goto reaches any labeled block, loop or not
    fn cond_transfer(
        &self,
        cond: &str,
        true_label: usize,
        _true_kind: BlockKind,
        false_label: usize,
    ) -> CodegenResult<String> {
        Ok(format!(
            "if {} {{ goto label{}; }} else {{ goto label{}; }}",
            cond, true_label, false_label
        ))
    }
}

/// Escape a string for use inside a C++ string literal
fn quote(text: &str) -> String {
    let escaped: String = text
        .chars()
        .flat_map(|c| c.escape_default())
        .collect();
    format!("\"{}\"", escaped)
}

/// Whole-unit C++ class renderer
pub struct CppGenerator {
    options: CodegenOptions,
    target: CppTarget,
}

impl CppGenerator {
    /// Create a generator with the given configuration
    pub fn new(options: CodegenOptions) -> Self {
        Self {
            options,
            target: CppTarget::new(options.precision),
        }
    }

    fn check_options(&self) -> CodegenResult<()> {
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

    fn real_arg(&self, value: f64) -> String {
        format_real(value, self.options.precision)
    }

    /// Render one bytecode block as method-body statements
    fn render_block(
        &self,
        block: &Block,
        out: &mut String,
        indent: usize,
        stats: &mut CompileStats,
    ) -> CodegenResult<()> {
        let mut compiler = FbcCompiler::new(&self.target);
        compiler.compile_phase(block)?;
        Self::render_list(compiler.blocks(), out, indent)?;
        stats.merge(compiler.into_stats());
        Ok(())
    }

    /// Render an emitted block list; label groups are only materialized when
    /// there is more than one block, so straight-line phases stay flat
    fn render_list(blocks: &BlockList, out: &mut String, indent: usize) -> CodegenResult<()> {
        if blocks.len() <= 1 {
            for block in blocks.iter() {
                for statement in &block.statements {
                    line(out, indent, statement)?;
                }
            }
            return Ok(());
        }
        for block in blocks.iter() {
            line(out, indent, &format!("label{}: {{", block.label))?;
            for statement in &block.statements {
                line(out, indent + 1, statement)?;
            }
            line(out, indent, "}")?;
        }
        Ok(())
    }

    fn render_ui(&self, factory: &Factory, out: &mut String) -> CodegenResult<()> {
        for instruction in &factory.user_interface_block {
            let call = match instruction {
                UiInstruction::OpenVerticalBox { label } => {
                    format!("ui_interface->openVerticalBox({});", quote(label))
                }
                UiInstruction::OpenHorizontalBox { label } => {
                    format!("ui_interface->openHorizontalBox({});", quote(label))
                }
                UiInstruction::OpenTabBox { label } => {
                    format!("ui_interface->openTabBox({});", quote(label))
                }
                UiInstruction::CloseBox => "ui_interface->closeBox();".to_string(),
                UiInstruction::AddButton { label, offset } => {
                    format!(
                        "ui_interface->addButton({}, &fRealHeap[{}]);",
                        quote(label),
                        offset
                    )
                }
                UiInstruction::AddCheckButton { label, offset } => {
                    format!(
                        "ui_interface->addCheckButton({}, &fRealHeap[{}]);",
                        quote(label),
                        offset
                    )
                }
                UiInstruction::AddHorizontalSlider {
                    label,
                    offset,
                    init,
                    min,
                    max,
                    step,
                } => format!(
                    "ui_interface->addHorizontalSlider({}, &fRealHeap[{}], {}, {}, {}, {});",
                    quote(label),
                    offset,
                    self.real_arg(*init),
                    self.real_arg(*min),
                    self.real_arg(*max),
                    self.real_arg(*step)
                ),
                UiInstruction::AddVerticalSlider {
                    label,
                    offset,
                    init,
                    min,
                    max,
                    step,
                } => format!(
                    "ui_interface->addVerticalSlider({}, &fRealHeap[{}], {}, {}, {}, {});",
                    quote(label),
                    offset,
                    self.real_arg(*init),
                    self.real_arg(*min),
                    self.real_arg(*max),
                    self.real_arg(*step)
                ),
                UiInstruction::AddNumEntry {
                    label,
                    offset,
                    init,
                    min,
                    max,
                    step,
                } => format!(
                    "ui_interface->addNumEntry({}, &fRealHeap[{}], {}, {}, {}, {});",
                    quote(label),
                    offset,
                    self.real_arg(*init),
                    self.real_arg(*min),
                    self.real_arg(*max),
                    self.real_arg(*step)
                ),
                UiInstruction::AddHorizontalBargraph {
                    label,
                    offset,
                    min,
                    max,
                } => format!(
                    "ui_interface->addHorizontalBargraph({}, &fRealHeap[{}], {}, {});",
                    quote(label),
                    offset,
                    self.real_arg(*min),
                    self.real_arg(*max)
                ),
                UiInstruction::AddVerticalBargraph {
                    label,
                    offset,
                    min,
                    max,
                } => format!(
                    "ui_interface->addVerticalBargraph({}, &fRealHeap[{}], {}, {});",
                    quote(label),
                    offset,
                    self.real_arg(*min),
                    self.real_arg(*max)
                ),
                UiInstruction::AddSoundFile { label } => {
                    format!("// TODO: addSoundfile({})", quote(label))
                }
                UiInstruction::Declare { offset, key, value } => match offset {
                    Some(offset) => format!(
                        "ui_interface->declare(&fRealHeap[{}], {}, {});",
                        offset,
                        quote(key),
                        quote(value)
                    ),
                    None => format!(
                        "ui_interface->declare(0, {}, {});",
                        quote(key),
                        quote(value)
                    ),
                },
            };
            line(out, 2, &call)?;
        }
        Ok(())
    }

    /// Render the full class for `factory` into `out`
    ///
    /// The configuration is validated first; on a configuration error the
    /// sink is left untouched. Returns the coverage accounting aggregated
    /// over every compiled phase.
    pub fn generate<W: std::fmt::Write>(
        &self,
        factory: &Factory,
        out: &mut W,
    ) -> CodegenResult<CompileStats> {
        self.check_options()?;

        let mut stats = CompileStats::default();
        let mut text = String::new();
        let name = &factory.name;
        let real = self.target.real_type();

        line(&mut text, 0, "#include <algorithm>")?;
        line(&mut text, 0, "#include <cmath>")?;
        line(&mut text, 0, "")?;
        line(&mut text, 0, "#ifndef sample_t")?;
        line(&mut text, 0, "#define sample_t float")?;
        line(&mut text, 0, "#endif")?;
        line(&mut text, 0, "")?;
        line(&mut text, 0, &format!("class {} {{", name))?;
        line(&mut text, 1, "private:")?;
        line(
            &mut text,
            2,
            &format!("int fIntHeap[{}];", factory.int_heap_size),
        )?;
        line(
            &mut text,
            2,
            &format!("{} fRealHeap[{}];", real, factory.real_heap_size),
        )?;
        line(&mut text, 1, "public:")?;

        line(
            &mut text,
            2,
            &format!("virtual int getNumInputs() {{ return {}; }}", factory.num_inputs),
        )?;
        line(
            &mut text,
            2,
            &format!(
                "virtual int getNumOutputs() {{ return {}; }}",
                factory.num_outputs
            ),
        )?;
        line(
            &mut text,
            2,
            &format!(
                "virtual int getSampleRate() {{ return fIntHeap[{}]; }}",
                factory.sr_offset
            ),
        )?;
        line(&mut text, 0, "")?;

        line(&mut text, 2, "virtual void metadata(Meta* m) {")?;
        for declaration in &factory.meta_block {
            line(
                &mut text,
                3,
                &format!(
                    "m->declare({}, {});",
                    quote(&declaration.key),
                    quote(&declaration.value)
                ),
            )?;
        }
        line(&mut text, 2, "}")?;
        line(&mut text, 0, "")?;

        let store_sr = format!("fIntHeap[{}] = sample_rate;", factory.sr_offset);
        let lifecycle: [(LifecyclePhase, &str, Option<&str>); 4] = [
            (LifecyclePhase::ClassInit, "int sample_rate", None),
            (
                LifecyclePhase::InstanceConstants,
                "int sample_rate",
                Some(store_sr.as_str()),
            ),
            (LifecyclePhase::InstanceResetUserInterface, "", None),
            (LifecyclePhase::InstanceClear, "", None),
        ];
        for (phase, params, prelude) in lifecycle {
            line(
                &mut text,
                2,
                &format!("virtual void {}({}) {{", phase.method_name(), params),
            )?;
            if let Some(statement) = prelude {
                line(&mut text, 3, statement)?;
            }
            let block = factory.code_block(phase).ok_or_else(|| {
                CodegenError::Internal(format!("{:?} has no bytecode block", phase))
            })?;
            self.render_block(block, &mut text, 3, &mut stats)?;
            line(&mut text, 2, "}")?;
            line(&mut text, 0, "")?;
        }

        line(&mut text, 2, "virtual void init(int sample_rate) {")?;
        line(&mut text, 3, "classInit(sample_rate);")?;
        line(&mut text, 3, "instanceInit(sample_rate);")?;
        line(&mut text, 2, "}")?;
        line(&mut text, 0, "")?;

        line(&mut text, 2, "virtual void instanceInit(int sample_rate) {")?;
        line(&mut text, 3, "instanceConstants(sample_rate);")?;
        line(&mut text, 3, "instanceResetUserInterface();")?;
        line(&mut text, 3, "instanceClear();")?;
        line(&mut text, 2, "}")?;
        line(&mut text, 0, "")?;

        line(
            &mut text,
            2,
            "virtual void buildUserInterface(UI* ui_interface) {",
        )?;
        self.render_ui(factory, &mut text)?;
        line(&mut text, 2, "}")?;
        line(&mut text, 0, "")?;

        line(
            &mut text,
            2,
            &format!("virtual {}* clone() {{ return new {}(); }}", name, name),
        )?;
        line(&mut text, 0, "")?;

        line(
            &mut text,
            2,
            "virtual void compute(int count, sample_t** inputs, sample_t** outputs) {",
        )?;
        // Zero frames is a documented no-op
        line(&mut text, 3, "if (count == 0) return;")?;
        line(
            &mut text,
            3,
            &format!("fIntHeap[{}] = count;", factory.count_offset),
        )?;

        // The loop-control prelude and the per-sample block share one
        // compiler so branch labels stay consistent across both
        let mut compiler = FbcCompiler::new(&self.target);
        compiler.compile_phase(&factory.compute_block)?;
        compiler.compile_phase_continued(&factory.compute_dsp_block)?;
        Self::render_list(compiler.blocks(), &mut text, 3)?;
        stats.merge(compiler.into_stats());

        line(&mut text, 2, "}")?;
        line(&mut text, 0, "};")?;

        out.write_str(&text)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonora_bytecode::Instruction;

    #[test]
    fn test_real_type_per_precision() {
        assert_eq!(CppTarget::new(Precision::Single).real_type(), "float");
        assert_eq!(CppTarget::new(Precision::Double).real_type(), "double");
        assert_eq!(CppTarget::new(Precision::Quad).real_type(), "long double");
    }

    #[test]
    fn test_io_conversions() {
        let target = CppTarget::new(Precision::Double);
        assert_eq!(target.load_input(0, "i"), "double(inputs[0][i])");
        assert_eq!(
            target.store_output(1, "i", "v"),
            "outputs[1][i] = sample_t(v);"
        );
    }

    #[test]
    fn test_bitcasts_take_the_address() {
        let target = CppTarget::new(Precision::Single);
        assert_eq!(
            target.bitcast_int("fRealHeap[3]").unwrap(),
            "(*reinterpret_cast<int*>(&fRealHeap[3]))"
        );
        assert_eq!(
            target.bitcast_real("fIntHeap[3]").unwrap(),
            "(*reinterpret_cast<float*>(&fIntHeap[3]))"
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
    }

    #[test]
    fn test_generate_smoke() {
        let mut factory = Factory::new("noop");
        factory.int_heap_size = 2;
        factory.real_heap_size = 2;
        factory.count_offset = 1;

        let generator = CppGenerator::new(CodegenOptions::default());
        let mut out = String::new();
        generator.generate(&factory, &mut out).unwrap();

        assert!(out.contains("class noop {"));
        assert!(out.contains("int fIntHeap[2];"));
        assert!(out.contains("float fRealHeap[2];"));
        assert!(out.contains("if (count == 0) return;"));
        assert!(out.contains("fIntHeap[1] = count;"));
        assert!(out.contains("virtual noop* clone() { return new noop(); }"));
    }

    #[test]
    fn test_vector_schedule_rejected_before_output() {
        let options = CodegenOptions {
            schedule: ScheduleMode::Vector,
            ..CodegenOptions::default()
        };
        let generator = CppGenerator::new(options);
        let mut out = String::new();
        let err = generator.generate(&Factory::new("x"), &mut out);
        assert!(matches!(err, Err(CodegenError::UnsupportedOption(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_sampling_rate_stored_before_init_block() {
        let mut factory = Factory::new("sr");
        factory.sr_offset = 0;
        factory
            .init_block
            .push(Instruction::new(Opcode::LoadInt).with_offset1(0));
        factory
            .init_block
            .push(Instruction::new(Opcode::StoreInt).with_offset1(1));

        let generator = CppGenerator::new(CodegenOptions::default());
        let mut out = String::new();
        generator.generate(&factory, &mut out).unwrap();

        let store_sr = out.find("fIntHeap[0] = sample_rate;").unwrap();
        let use_sr = out.find("fIntHeap[1] = fIntHeap[0];").unwrap();
        assert!(store_sr < use_sr);
    }
}
