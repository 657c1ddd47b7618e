//! Persisted solver configuration.
//!
//! [`SqpConfig`] captures everything needed to rebuild an equivalent
//! solver: schema tag and version, the QP subsolver descriptor, all
//! numeric and boolean options, and the two sparsity patterns. Field
//! declaration order is the wire order. A deserialized configuration
//! must reproduce bit-identical iterates for the same inputs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linalg::Sparsity;
use crate::oracle::NlpOracle;
use crate::problem::{HessianApprox, SqpSettings};
use crate::sqp::Sqp;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Malformed JSON or mismatched structure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The record carries an unknown schema tag or version.
    #[error("unsupported configuration record: {schema} v{version}")]
    SchemaMismatch {
        /// Schema tag found in the record
        schema: String,
        /// Version found in the record
        version: u32,
    },
}

/// Versioned solver-configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqpConfig {
    /// Schema tag, always [`SqpConfig::SCHEMA`].
    pub schema: String,

    /// Schema version, always [`SqpConfig::VERSION`].
    pub version: u32,

    /// QP subsolver descriptor.
    pub qpsol: String,

    /// Hessian handling mode.
    pub hessian_approximation: HessianApprox,

    /// Iteration cap.
    pub max_iter: usize,

    /// Iteration floor.
    pub min_iter: usize,

    /// BFGS reset period.
    pub lbfgs_memory: usize,

    /// Primal tolerance.
    pub tol_pr: f64,

    /// Dual tolerance.
    pub tol_du: f64,

    /// Stall threshold.
    pub min_step_size: f64,

    /// Armijo coefficient.
    pub c1: f64,

    /// Backtracking factor.
    pub beta: f64,

    /// Line-search trial cap.
    pub max_iter_ls: usize,

    /// Merit window length.
    pub merit_memory: usize,

    /// Banner printing.
    pub print_header: bool,

    /// Iteration printing.
    pub print_iteration: bool,

    /// Status printing.
    pub print_status: bool,

    /// Lagrangian Hessian pattern.
    pub hsp: Sparsity,

    /// Constraint Jacobian pattern.
    pub asp: Sparsity,

    /// Gershgorin regularization.
    pub regularize: bool,
}

impl SqpConfig {
    /// Schema tag of this record type.
    pub const SCHEMA: &'static str = "Sqpmethod";

    /// Current schema version.
    pub const VERSION: u32 = 1;

    /// Capture a configuration from settings and patterns.
    pub fn new(settings: &SqpSettings, hsp: &Sparsity, asp: &Sparsity) -> Self {
        Self {
            schema: Self::SCHEMA.to_string(),
            version: Self::VERSION,
            qpsol: settings.qpsol.clone(),
            hessian_approximation: settings.hessian_approximation,
            max_iter: settings.max_iter,
            min_iter: settings.min_iter,
            lbfgs_memory: settings.lbfgs_memory,
            tol_pr: settings.tol_pr,
            tol_du: settings.tol_du,
            min_step_size: settings.min_step_size,
            c1: settings.c1,
            beta: settings.beta,
            max_iter_ls: settings.max_iter_ls,
            merit_memory: settings.merit_memory,
            print_header: settings.print_header,
            print_iteration: settings.print_iteration,
            print_status: settings.print_status,
            hsp: hsp.clone(),
            asp: asp.clone(),
            regularize: settings.regularize,
        }
    }

    /// Rebuild the settings struct.
    pub fn settings(&self) -> SqpSettings {
        SqpSettings {
            qpsol: self.qpsol.clone(),
            hessian_approximation: self.hessian_approximation,
            max_iter: self.max_iter,
            min_iter: self.min_iter,
            max_iter_ls: self.max_iter_ls,
            tol_pr: self.tol_pr,
            tol_du: self.tol_du,
            c1: self.c1,
            beta: self.beta,
            merit_memory: self.merit_memory,
            lbfgs_memory: self.lbfgs_memory,
            regularize: self.regularize,
            print_header: self.print_header,
            print_iteration: self.print_iteration,
            print_status: self.print_status,
            min_step_size: self.min_step_size,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SerializeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON, rejecting unknown schema tags/versions.
    pub fn from_json(s: &str) -> Result<Self, SerializeError> {
        let config: Self = serde_json::from_str(s)?;
        if config.schema != Self::SCHEMA || config.version != Self::VERSION {
            return Err(SerializeError::SchemaMismatch {
                schema: config.schema,
                version: config.version,
            });
        }
        Ok(config)
    }
}

impl<O: NlpOracle> Sqp<O> {
    /// Capture this solver's persisted configuration.
    pub fn config(&self) -> SqpConfig {
        SqpConfig::new(self.settings(), self.hess_sp(), &self.problem().jac_sp)
    }
}
