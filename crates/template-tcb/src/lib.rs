//! Type-check block generation for component templates.
//!
//! Given a bound template (see `template-ast`), this crate synthesizes a
//! statically-typeable chunk of code per template, a bidirectional source
//! map between the generated code and the template, and out-of-band
//! diagnostics for problems the external type checker cannot see. The
//! actual type checking happens elsewhere; this crate only produces its
//! input and the means to project its results back.
//!
//! # Example
//!
//! ```
//! use template_ast::{build_template_ast, BoundTarget, Registry};
//! use template_tcb::{transpile_component_file, ComponentFileInput, SourceId,
//!     TemplateOrigin, TemplateUnit, TypeCheckConfig};
//!
//! let registry = Registry::new();
//! let ast = build_template_ast(vec![]);
//! let bound = BoundTarget::new(&ast, &registry);
//! let result = transpile_component_file(
//!     TypeCheckConfig::default(),
//!     &ComponentFileInput {
//!         component_file: SourceId(0),
//!         component_source: "class Empty {}",
//!         component_type_name: "Empty",
//!         templates: vec![TemplateUnit {
//!             bound: &bound,
//!             origin: TemplateOrigin::External { file: SourceId(1) },
//!         }],
//!     },
//! )
//! .unwrap();
//! assert!(result.generated_code.contains("function _tcb_1"));
//! ```

mod emit;
mod env;
mod expression;
mod file;
mod oob;
mod tcb;

pub use emit::{
    Expression, ExpressionBuilder, Identifier, NameMapping, Statement, MAP_FULL, MAP_NAV,
    MAP_TYPES_ONLY,
};
pub use env::{Environment, TypeCheckConfig};
pub use file::{
    transpile_component_file, ComponentFileInput, FileMappings, SourceId, TemplateOrigin,
    TemplateUnit, TranspileError, TranspiledComponentFile,
};
pub use oob::{Diagnostic, OobCode, OobRecorder, Severity};
pub use tcb::{transpile_template, TranspiledTemplate};
