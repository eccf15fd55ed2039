//! Forms: precompiled definitions bound to spaces, coefficients and
//! constants, and cut forms that add runtime-quadrature subdomains.

use crate::algs::communicator::Communicator;
use crate::fem::element::FiniteElement;
use crate::fem::function::{Function, FunctionSpace};
use crate::fem::kernel::TabulateTensor;
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;
use crate::quadrature::QuadratureRules;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Domain an integral runs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegralType {
    /// Whole cells, built-in quadrature.
    Cell,
    /// Part of a cut cell, runtime quadrature.
    CutCell,
    /// Interface inside a cut cell, runtime quadrature with normals.
    Interface,
}

/// Subdomain id of the integral used where no id matches.
pub const DEFAULT_SUBDOMAIN: i32 = -1;

#[derive(Clone)]
pub struct FormIntegral {
    pub id: i32,
    pub kernel: Arc<dyn TabulateTensor>,
}

impl fmt::Debug for FormIntegral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormIntegral")
            .field("id", &self.id)
            .field("kernel", &self.kernel.name())
            .finish()
    }
}

/// A precompiled form: rank, kernels per integral type and subdomain id,
/// constant names and coefficient count.
#[derive(Clone, Debug, Default)]
pub struct FormDefinition {
    pub rank: usize,
    pub integrals: BTreeMap<IntegralType, Vec<FormIntegral>>,
    pub constant_names: Vec<String>,
    pub num_coefficients: usize,
}

impl FormDefinition {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            ..Self::default()
        }
    }

    /// Add (or replace) the kernel for subdomain `id` of `ty`.
    pub fn with_integral(mut self, ty: IntegralType, id: i32, kernel: Arc<dyn TabulateTensor>) -> Self {
        let list = self.integrals.entry(ty).or_default();
        list.retain(|i| i.id != id);
        list.push(FormIntegral { id, kernel });
        list.sort_by_key(|i| i.id);
        self
    }

    pub fn with_constants<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.constant_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_coefficients(mut self, n: usize) -> Self {
        self.num_coefficients = n;
        self
    }

    /// Kernel for subdomain `id`, falling back to [`DEFAULT_SUBDOMAIN`].
    pub fn integral(&self, ty: IntegralType, id: i32) -> Option<&Arc<dyn TabulateTensor>> {
        let list = self.integrals.get(&ty)?;
        list.iter()
            .find(|i| i.id == id)
            .or_else(|| list.iter().find(|i| i.id == DEFAULT_SUBDOMAIN))
            .map(|i| &i.kernel)
    }
}

/// A [`FormDefinition`] bound to a mesh and its inputs.
#[derive(Debug)]
pub struct Form<C> {
    definition: Arc<FormDefinition>,
    mesh: Arc<Mesh<C>>,
    spaces: Vec<Arc<FunctionSpace<C>>>,
    coefficients: Vec<Arc<Function<C>>>,
    constants: Vec<f64>,
    cell_domains: Vec<(i32, Vec<usize>)>,
}

impl<C: Communicator> Form<C> {
    pub fn definition(&self) -> &Arc<FormDefinition> {
        &self.definition
    }

    pub fn mesh(&self) -> &Arc<Mesh<C>> {
        &self.mesh
    }

    pub fn rank(&self) -> usize {
        self.definition.rank
    }

    /// Argument spaces: test, then trial.
    pub fn function_spaces(&self) -> &[Arc<FunctionSpace<C>>] {
        &self.spaces
    }

    pub fn coefficients(&self) -> &[Arc<Function<C>>] {
        &self.coefficients
    }

    /// Constant values, ordered as the definition's constant names.
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    pub fn cell_domains(&self) -> &[(i32, Vec<usize>)] {
        &self.cell_domains
    }

    /// Elements in kernel slot order: coordinate element, argument
    /// elements, coefficient elements.
    pub fn elements(&self) -> Result<Vec<FiniteElement>, MeshError> {
        let mut out = vec![FiniteElement::from_coordinate_element(self.mesh.geometry().cmap())?];
        out.extend(self.spaces.iter().map(|v| *v.element()));
        out.extend(self.coefficients.iter().map(|f| *f.function_space().element()));
        Ok(out)
    }

    /// Coefficient dofs of cell `c`, coefficient by coefficient.
    pub fn cell_coefficients(&self, c: usize) -> Vec<f64> {
        let mut w = Vec::new();
        for f in &self.coefficients {
            let values = f.values();
            w.extend(f.function_space().cell_dofs(c).iter().map(|&d| values[d]));
        }
        w
    }

    /// Entries of the element tensor.
    pub fn tensor_size(&self) -> usize {
        self.spaces.iter().map(|v| v.element().dim()).product()
    }
}

/// Bind `definition` to `spaces` (test, then trial), coefficients and
/// named constants.
///
/// `cell_domains` restricts the [`IntegralType::Cell`] integrals to lists
/// of local cells per subdomain id; with no domains the default integral
/// runs over every owned cell.
pub fn create_form<C: Communicator>(
    definition: Arc<FormDefinition>,
    spaces: Vec<Arc<FunctionSpace<C>>>,
    coefficients: Vec<Arc<Function<C>>>,
    constants: &[(&str, f64)],
    cell_domains: Vec<(i32, Vec<usize>)>,
    mesh: Arc<Mesh<C>>,
) -> Result<Form<C>, MeshError> {
    if spaces.len() != definition.rank {
        return Err(MeshError::FormRank {
            expected: definition.rank,
            found: spaces.len(),
        });
    }
    if coefficients.len() < definition.num_coefficients {
        return Err(MeshError::MissingFormInput(format!(
            "coefficient {}",
            coefficients.len()
        )));
    }
    let constants = definition
        .constant_names
        .iter()
        .map(|name| {
            constants
                .iter()
                .find(|(n, _)| n == name)
                .map(|&(_, v)| v)
                .ok_or_else(|| MeshError::MissingFormInput(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let num_cells = mesh.num_cells();
    let mut domains = Vec::with_capacity(cell_domains.len());
    for (id, mut cells) in cell_domains {
        if let Some(&bad) = cells.iter().find(|&&c| c >= num_cells) {
            return Err(MeshError::InvalidIndex {
                index: bad,
                size: num_cells,
            });
        }
        if definition.integral(IntegralType::Cell, id).is_none() {
            return Err(MeshError::MissingFormInput(format!("cell integral {id}")));
        }
        cells.sort_unstable();
        cells.dedup();
        domains.push((id, cells));
    }
    domains.sort_by_key(|(id, _)| *id);

    let coefficients = coefficients
        .into_iter()
        .take(definition.num_coefficients)
        .collect();
    Ok(Form {
        definition,
        mesh,
        spaces,
        coefficients,
        constants,
        cell_domains: domains,
    })
}

/// Runtime-quadrature subdomains per integral type.
pub type Subdomains = BTreeMap<IntegralType, Vec<(i32, Arc<QuadratureRules>)>>;

/// A standard form plus runtime-quadrature integrals over cut cells.
#[derive(Debug)]
pub struct CutForm<C> {
    form: Arc<Form<C>>,
    definition: Arc<FormDefinition>,
    subdomains: Subdomains,
}

impl<C: Communicator> CutForm<C> {
    /// The standard part.
    pub fn form(&self) -> &Arc<Form<C>> {
        &self.form
    }

    /// Definition holding the runtime kernels.
    pub fn definition(&self) -> &Arc<FormDefinition> {
        &self.definition
    }

    pub fn subdomains(&self) -> &Subdomains {
        &self.subdomains
    }

    pub fn rank(&self) -> usize {
        self.form.rank()
    }
}

/// Attach runtime-quadrature `subdomains` to `form`.
///
/// Every `(type, id)` must resolve to a kernel of `definition` and every
/// rule cell must be a local cell of the form's mesh.
pub fn create_cut_form<C: Communicator>(
    definition: Arc<FormDefinition>,
    form: Arc<Form<C>>,
    subdomains: Subdomains,
) -> Result<CutForm<C>, MeshError> {
    if definition.rank != form.rank() {
        return Err(MeshError::FormRank {
            expected: form.rank(),
            found: definition.rank,
        });
    }
    let num_cells = form.mesh().num_cells();
    for (&ty, list) in &subdomains {
        for (id, rules) in list {
            if definition.integral(ty, *id).is_none() {
                return Err(MeshError::MissingFormInput(format!("{ty:?} integral {id}")));
            }
            if let Some(bad) = rules.cells().into_iter().find(|&c| c >= num_cells) {
                return Err(MeshError::InvalidIndex {
                    index: bad,
                    size: num_cells,
                });
            }
        }
    }
    Ok(CutForm {
        form,
        definition,
        subdomains,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::fem::kernels::LagrangeKernel;
    use crate::mesh::MeshConfig;
    use crate::mesh::generation::create_rectangle;
    use crate::topology::cell_type::CellType;

    fn setup() -> (Arc<Mesh<NoComm>>, FiniteElement) {
        let mesh = create_rectangle(
            &NoComm,
            [0.0, 0.0],
            [1.0, 1.0],
            [2, 2],
            CellType::Triangle,
            &MeshConfig::default(),
        )
        .unwrap();
        (Arc::new(mesh), FiniteElement::new(CellType::Triangle, 1).unwrap())
    }

    fn area_definition(p1: FiniteElement) -> Arc<FormDefinition> {
        let k = LagrangeKernel::constant_functional(p1, 1).unwrap();
        Arc::new(
            FormDefinition::new(0)
                .with_integral(IntegralType::Cell, DEFAULT_SUBDOMAIN, Arc::new(k))
                .with_constants(["alpha"]),
        )
    }

    #[test]
    fn integral_falls_back_to_default_id() {
        let (_, p1) = setup();
        let def = area_definition(p1);
        assert!(def.integral(IntegralType::Cell, 3).is_some());
        assert!(def.integral(IntegralType::CutCell, -1).is_none());
    }

    #[test]
    fn missing_constant_is_reported() {
        let (mesh, p1) = setup();
        let err = create_form(area_definition(p1), vec![], vec![], &[("beta", 1.0)], vec![], mesh)
            .unwrap_err();
        assert_eq!(err, MeshError::MissingFormInput("alpha".into()));
    }

    #[test]
    fn rank_and_cell_range_are_checked() {
        let (mesh, p1) = setup();
        let v = Arc::new(FunctionSpace::new(Arc::clone(&mesh), p1).unwrap());
        let err = create_form(area_definition(p1), vec![v], vec![], &[("alpha", 1.0)], vec![], Arc::clone(&mesh))
            .unwrap_err();
        assert_eq!(err, MeshError::FormRank { expected: 0, found: 1 });

        let err = create_form(
            area_definition(p1),
            vec![],
            vec![],
            &[("alpha", 1.0)],
            vec![(0, vec![0, 99])],
            Arc::clone(&mesh),
        )
        .unwrap_err();
        assert_eq!(err, MeshError::InvalidIndex { index: 99, size: 8 });
    }

    #[test]
    fn cut_form_requires_runtime_kernels() {
        let (mesh, p1) = setup();
        let def = area_definition(p1);
        let form = Arc::new(create_form(Arc::clone(&def), vec![], vec![], &[("alpha", 1.0)], vec![], mesh).unwrap());
        let mut subdomains = Subdomains::new();
        subdomains.insert(IntegralType::Interface, vec![(0, Arc::new(QuadratureRules::new()))]);
        let err = create_cut_form(def, Arc::clone(&form), subdomains).unwrap_err();
        assert!(matches!(err, MeshError::MissingFormInput(_)));
        assert_eq!(form.elements().unwrap(), vec![p1]);
        assert_eq!(form.tensor_size(), 1);
    }
}
