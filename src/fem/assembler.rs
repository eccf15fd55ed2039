//! Assembly of cut forms.
//!
//! The standard part of a cut form runs the compiled path of its cell
//! kernels; every runtime subdomain then runs the runtime path on its
//! quadrature rules. Element tensors are computed first (optionally in
//! parallel) and accumulated afterwards in a fixed order: standard pass,
//! then subdomains by integral type and id, cells ascending within each.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_reduce_sum};
use crate::fem::element::{FiniteElement, Tabulation};
use crate::fem::form::{CutForm, DEFAULT_SUBDOMAIN, Form, IntegralType};
use crate::fem::kernel::{EvaluationMode, RuntimeQuadrature, TabulateTensor};
use crate::mesh_error::MeshError;
use crate::quadrature::QuadratureRule;
use hashbrown::HashMap;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Compute element tensors with rayon (needs the `rayon` feature).
    pub parallel: bool,
}

type TableKey = (u64, usize, Vec<u64>);

/// Basis tables keyed by element, derivative order and the exact point set.
#[derive(Debug, Default)]
pub struct TabulationCache {
    tables: Mutex<HashMap<TableKey, Arc<Tabulation>>>,
}

impl TabulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_tabulate(
        &self,
        element: &FiniteElement,
        nd: usize,
        points: &[f64],
    ) -> Result<Arc<Tabulation>, MeshError> {
        let key: TableKey = (element.hash(), nd, points.iter().map(|p| p.to_bits()).collect());
        if let Some(t) = self.tables.lock().get(&key) {
            return Ok(Arc::clone(t));
        }
        let table = Arc::new(element.tabulate(nd, points)?);
        Ok(Arc::clone(self.tables.lock().entry(key).or_insert(table)))
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CellWork<'a> {
    kernel: &'a dyn TabulateTensor,
    cell: usize,
    /// `None` runs the compiled path.
    rule: Option<&'a QuadratureRule>,
}

fn check_hashes(kernel: &dyn TabulateTensor, id: i32, elements: &[FiniteElement]) -> Result<(), MeshError> {
    for (slot, &expected) in kernel.finite_element_hashes().iter().enumerate() {
        let found = elements.get(slot).map_or(0, FiniteElement::hash);
        if found != expected {
            return Err(MeshError::ElementHashMismatch {
                integral: id,
                slot,
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn num_owned_cells<C: Communicator>(form: &Form<C>) -> usize {
    let topology = form.mesh().topology();
    topology
        .index_map(topology.dim())
        .map_or_else(|| form.mesh().num_cells(), |m| m.size_local())
}

/// Every (kernel, cell, rule) triple of `cut_form` in accumulation order.
/// Element hashes are checked here, before any tensor is computed.
fn collect_work<'a, C: Communicator>(
    cut_form: &'a CutForm<C>,
    elements: &[FiniteElement],
) -> Result<Vec<CellWork<'a>>, MeshError> {
    let form = cut_form.form().as_ref();
    let owned = num_owned_cells(form);
    let mut work = Vec::new();

    let definition = form.definition();
    if form.cell_domains().is_empty() {
        if let Some(kernel) = definition.integral(IntegralType::Cell, DEFAULT_SUBDOMAIN) {
            check_hashes(kernel.as_ref(), DEFAULT_SUBDOMAIN, elements)?;
            work.extend((0..owned).map(|cell| CellWork {
                kernel: kernel.as_ref(),
                cell,
                rule: None,
            }));
        }
    } else {
        for (id, cells) in form.cell_domains() {
            let kernel = definition
                .integral(IntegralType::Cell, *id)
                .ok_or_else(|| MeshError::MissingFormInput(format!("cell integral {id}")))?;
            check_hashes(kernel.as_ref(), *id, elements)?;
            work.extend(cells.iter().filter(|&&c| c < owned).map(|&cell| CellWork {
                kernel: kernel.as_ref(),
                cell,
                rule: None,
            }));
        }
    }

    for (&ty, list) in cut_form.subdomains() {
        for (id, rules) in list {
            let kernel = cut_form
                .definition()
                .integral(ty, *id)
                .ok_or_else(|| MeshError::MissingFormInput(format!("{ty:?} integral {id}")))?;
            check_hashes(kernel.as_ref(), *id, elements)?;
            work.extend(
                rules
                    .iter()
                    .filter(|(cell, rule)| *cell < owned && !rule.is_empty())
                    .map(|(cell, rule)| CellWork {
                        kernel: kernel.as_ref(),
                        cell,
                        rule: Some(rule),
                    }),
            );
        }
    }
    Ok(work)
}

fn element_tensor<C: Communicator>(
    form: &Form<C>,
    elements: &[FiniteElement],
    cache: &TabulationCache,
    work: &CellWork<'_>,
) -> Result<Vec<f64>, MeshError> {
    let x = form.mesh().cell_coordinates(work.cell);
    let w = form.cell_coefficients(work.cell);
    let mut a = vec![0.0; form.tensor_size()];
    match work.rule {
        None => work
            .kernel
            .tabulate_tensor(&mut a, &w, form.constants(), &x, &EvaluationMode::Compiled)?,
        Some(rule) => {
            let tables = work
                .kernel
                .finite_element_deriv_orders()
                .iter()
                .zip(elements)
                .map(|(&nd, el)| cache.get_or_tabulate(el, nd, &rule.points))
                .collect::<Result<Vec<_>, _>>()?;
            let tables: Vec<&Tabulation> = tables.iter().map(Arc::as_ref).collect();
            let mode = EvaluationMode::Runtime(RuntimeQuadrature {
                points: &rule.points,
                weights: &rule.weights,
                normals: &rule.normals,
                tables: &tables,
            });
            work.kernel
                .tabulate_tensor(&mut a, &w, form.constants(), &x, &mode)?;
        }
    }
    Ok(a)
}

/// Element tensors of every work item, in work order.
fn element_tensors<'a, C: Communicator>(
    cut_form: &'a CutForm<C>,
    opts: &AssemblyOptions,
) -> Result<(Vec<CellWork<'a>>, Vec<Vec<f64>>), MeshError> {
    let form = cut_form.form().as_ref();
    let elements = form.elements()?;
    let work = collect_work(cut_form, &elements)?;
    let cache = TabulationCache::new();
    let eval = |w: &CellWork<'a>| element_tensor(form, &elements, &cache, w);

    #[cfg(feature = "rayon")]
    let tensors: Result<Vec<Vec<f64>>, MeshError> = if opts.parallel {
        use rayon::prelude::*;
        work.par_iter().map(eval).collect()
    } else {
        work.iter().map(eval).collect()
    };
    #[cfg(not(feature = "rayon"))]
    let tensors: Result<Vec<Vec<f64>>, MeshError> = {
        if opts.parallel {
            debug!("parallel assembly requested without the rayon feature");
        }
        work.iter().map(eval).collect()
    };

    let tensors = tensors?;
    debug!(
        "[rank {}] {} element tensors, {} distinct tables",
        form.mesh().comm().rank(),
        tensors.len(),
        cache.len()
    );
    Ok((work, tensors))
}

fn check_rank<C: Communicator>(cut_form: &CutForm<C>, expected: usize) -> Result<(), MeshError> {
    if cut_form.rank() != expected {
        return Err(MeshError::FormRank {
            expected,
            found: cut_form.rank(),
        });
    }
    Ok(())
}

/// Collective: assemble a rank-0 cut form over owned cells and sum the
/// result over all ranks.
pub fn assemble_scalar<C: Communicator>(cut_form: &CutForm<C>) -> Result<f64, MeshError> {
    assemble_scalar_with(cut_form, &AssemblyOptions::default())
}

pub fn assemble_scalar_with<C: Communicator>(
    cut_form: &CutForm<C>,
    opts: &AssemblyOptions,
) -> Result<f64, MeshError> {
    let comm = cut_form.form().mesh().comm();
    let local = check_rank(cut_form, 0)
        .and_then(|_| element_tensors(cut_form, opts))
        .map(|(_, tensors)| tensors.iter().map(|a| a[0]).sum::<f64>());
    let local = agree(comm, local, "assemble_scalar")?;
    all_reduce_sum(comm, local)
}

/// Assemble a rank-1 cut form into a vector over the local dofs of the
/// test space. Ghost contributions are not sent to their owners.
pub fn assemble_vector<C: Communicator>(
    cut_form: &CutForm<C>,
    opts: &AssemblyOptions,
) -> Result<Vec<f64>, MeshError> {
    check_rank(cut_form, 1)?;
    let (work, tensors) = element_tensors(cut_form, opts)?;
    let space = &cut_form.form().function_spaces()[0];
    let mut b = vec![0.0; space.num_dofs()];
    for (w, a) in work.iter().zip(&tensors) {
        for (&dof, v) in space.cell_dofs(w.cell).iter().zip(a) {
            b[dof] += v;
        }
    }
    Ok(b)
}

/// Assemble a rank-2 cut form into `(row, col, value)` triplets over local
/// dofs, one per element tensor entry, duplicates not summed.
pub fn assemble_matrix<C: Communicator>(
    cut_form: &CutForm<C>,
    opts: &AssemblyOptions,
) -> Result<Vec<(usize, usize, f64)>, MeshError> {
    check_rank(cut_form, 2)?;
    let (work, tensors) = element_tensors(cut_form, opts)?;
    let spaces = cut_form.form().function_spaces();
    let mut triplets = Vec::new();
    for (w, a) in work.iter().zip(&tensors) {
        let rows = spaces[0].cell_dofs(w.cell);
        let cols = spaces[1].cell_dofs(w.cell);
        for (i, &r) in rows.iter().enumerate() {
            for (j, &c) in cols.iter().enumerate() {
                triplets.push((r, c, a[i * cols.len() + j]));
            }
        }
    }
    Ok(triplets)
}
