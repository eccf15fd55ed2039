//! Finite elements, functions, element kernels, forms and assembly.

pub mod assembler;
pub mod element;
pub mod form;
pub mod function;
pub mod kernel;
pub mod kernels;

pub use assembler::{
    AssemblyOptions, TabulationCache, assemble_matrix, assemble_scalar, assemble_scalar_with,
    assemble_vector,
};
pub use element::{FiniteElement, Tabulation};
pub use form::{
    CutForm, DEFAULT_SUBDOMAIN, Form, FormDefinition, FormIntegral, IntegralType, Subdomains,
    create_cut_form, create_form,
};
pub use function::{Function, FunctionSpace};
pub use kernel::{EvaluationKind, EvaluationMode, RuntimeQuadrature, TabulateTensor};
pub use kernels::{KernelKind, LagrangeKernel};
