//! Python bindings.
//!
//! Lets Python collaborators feed and query the ledger in-process. Values
//! cross the boundary as JSON strings.

use crate::bal::query::EventQuery;
use crate::core::{parse_event, Error};
use crate::ledger::engine::AuditLedger;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Validation(_) | Error::InvalidConfig(_) => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyclass(name = "Ledger")]
pub struct PyLedger {
    inner: AuditLedger,
}

#[pymethods]
impl PyLedger {
    #[new]
    #[pyo3(signature = (db_path, difficulty = 4, batch_size = 100))]
    fn new(py: Python<'_>, db_path: String, difficulty: u32, batch_size: usize) -> PyResult<Self> {
        let inner = py
            .allow_threads(|| AuditLedger::initialize(db_path, difficulty, batch_size))
            .map_err(to_py_err)?;
        Ok(PyLedger { inner })
    }

    /// Add a JSON event; returns the receipt as JSON.
    fn add_event(&self, py: Python<'_>, event: String) -> PyResult<String> {
        let record = parse_event(&event).map_err(to_py_err)?;
        let receipt = py
            .allow_threads(|| self.inner.add_event(record))
            .map_err(to_py_err)?;
        to_json(&receipt)
    }

    /// Mine pending events; returns the block as JSON, or None.
    fn mine(&self, py: Python<'_>) -> PyResult<Option<String>> {
        let block = py
            .allow_threads(|| self.inner.mine_pending_block())
            .map_err(to_py_err)?;
        block.as_ref().map(to_json).transpose()
    }

    fn verify(&self, py: Python<'_>) -> PyResult<String> {
        to_json(&py.allow_threads(|| self.inner.verify_chain()))
    }

    fn search(&self, py: Python<'_>, query: String) -> PyResult<String> {
        let query = EventQuery::from_json(&query).map_err(to_py_err)?;
        to_json(&py.allow_threads(|| self.inner.search_events(&query)))
    }

    fn events_in_range(&self, py: Python<'_>, start: String, end: String) -> PyResult<String> {
        to_json(&py.allow_threads(|| self.inner.events_in_time_range(&start, &end)))
    }

    fn export(&self, py: Python<'_>, start: String, end: String) -> PyResult<String> {
        to_json(&py.allow_threads(|| self.inner.export_compliance_report(&start, &end)))
    }

    fn stats(&self, py: Python<'_>) -> PyResult<String> {
        to_json(&py.allow_threads(|| self.inner.get_stats()))
    }

    fn __len__(&self) -> usize {
        self.inner.chain_len()
    }
}

// --- Module ---

#[pymodule]
fn auditchain(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyLedger>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
