use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use bstr::ByteSlice;
use cqdb::CQDB;

use crate::context::{Context, EvalParameters};
use crate::eval;
use crate::prior::{Prior, UniformPrior};

pub(crate) const MAGIC: &[u8; 4] = b"lMXE";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 40;
pub(crate) const CHUNK_SIZE: usize = 12;

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> io::Result<u32> {
    if buf.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking u32",
        ));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
fn unpack_f64(buf: &[u8]) -> io::Result<f64> {
    if buf.len() < 8 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data for unpacking f64",
        ));
    }
    Ok(f64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]))
}

/// Kind of trained model, which decides how contexts are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Log-linear model trained with GIS
    Maxent,
    /// Perceptron weights
    Perceptron,
    /// Naive Bayes counts
    NaiveBayes,
}

impl ModelType {
    pub(crate) fn tag(self) -> &'static [u8; 4] {
        match self {
            Self::Maxent => b"GIS_",
            Self::Perceptron => b"PERC",
            Self::NaiveBayes => b"NBAY",
        }
    }

    pub(crate) fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"GIS_" => Some(Self::Maxent),
            b"PERC" => Some(Self::Perceptron),
            b"NBAY" => Some(Self::NaiveBayes),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Maxent => "MAXENT",
            Self::Perceptron => "PERCEPTRON",
            Self::NaiveBayes => "NAIVEBAYES",
        };
        f.write_str(name)
    }
}

/// A trained classifier
///
/// The model owns its weight table and label tables and never changes after
/// construction.
#[derive(Debug, Clone)]
pub struct MaxentModel {
    model_type: ModelType,
    params: Vec<Context>,
    pred_labels: Vec<String>,
    outcome_names: Vec<String>,
    pmap: HashMap<String, usize>,
    prior: Box<dyn Prior>,
    /// Per-outcome count totals, only filled for naive Bayes models
    outcome_totals: Vec<f64>,
}

impl MaxentModel {
    /// Create a model with a uniform prior
    pub fn new(
        model_type: ModelType,
        params: Vec<Context>,
        pred_labels: Vec<String>,
        outcome_names: Vec<String>,
    ) -> Self {
        Self::with_prior(
            model_type,
            params,
            pred_labels,
            outcome_names,
            Box::new(UniformPrior::new()),
        )
    }

    /// Create a model with a custom prior
    ///
    /// # Panics
    ///
    /// Panics if `params` and `pred_labels` differ in length.
    pub fn with_prior(
        model_type: ModelType,
        params: Vec<Context>,
        pred_labels: Vec<String>,
        outcome_names: Vec<String>,
        mut prior: Box<dyn Prior>,
    ) -> Self {
        assert_eq!(
            params.len(),
            pred_labels.len(),
            "params length ({}) must equal number of predicates ({})",
            params.len(),
            pred_labels.len()
        );
        prior.set_labels(&outcome_names, &pred_labels);
        let pmap = pred_labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        let outcome_totals = if model_type == ModelType::NaiveBayes {
            let mut totals = vec![0.0; outcome_names.len()];
            for context in &params {
                for (&oid, &count) in context.outcomes().iter().zip(context.parameters()) {
                    totals[oid] += count;
                }
            }
            totals
        } else {
            Vec::new()
        };
        Self {
            model_type,
            params,
            pred_labels,
            outcome_names,
            pmap,
            prior,
            outcome_totals,
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcome_names.len()
    }

    pub fn num_preds(&self) -> usize {
        self.pred_labels.len()
    }

    /// Weight table, one context per predicate id
    pub fn params(&self) -> &[Context] {
        &self.params
    }

    pub fn pred_labels(&self) -> &[String] {
        &self.pred_labels
    }

    pub fn outcome_names(&self) -> &[String] {
        &self.outcome_names
    }

    /// Convert an outcome id to its label
    pub fn outcome(&self, index: usize) -> Option<&str> {
        self.outcome_names.get(index).map(String::as_str)
    }

    /// Convert an outcome label to its id
    pub fn index(&self, outcome: &str) -> Option<usize> {
        self.outcome_names.iter().position(|o| o == outcome)
    }

    /// Convert a predicate label to its id
    pub fn pred_index(&self, pred: &str) -> Option<usize> {
        self.pmap.get(pred).copied()
    }

    /// Outcome distribution of a context whose predicates all have value `1.0`
    ///
    /// Predicates unknown to the model are ignored.
    pub fn eval<S: AsRef<str>>(&self, context: &[S]) -> Vec<f64> {
        let ids: Vec<(usize, f32)> = context
            .iter()
            .filter_map(|pred| self.pred_index(pred.as_ref()).map(|pid| (pid, 1.0)))
            .collect();
        self.eval_ids(&ids, false)
    }

    /// Outcome distribution of a context with real-valued predicates
    pub fn eval_with_values<S: AsRef<str>>(&self, context: &[S], values: &[f32]) -> io::Result<Vec<f64>> {
        if context.len() != values.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "context and values must have the same length",
            ));
        }
        let ids: Vec<(usize, f32)> = context
            .iter()
            .zip(values)
            .filter_map(|(pred, &value)| self.pred_index(pred.as_ref()).map(|pid| (pid, value)))
            .collect();
        Ok(self.eval_ids(&ids, true))
    }

    fn eval_ids(&self, ids: &[(usize, f32)], with_values: bool) -> Vec<f64> {
        let context: Vec<usize> = ids.iter().map(|&(pid, _)| pid).collect();
        let values: Vec<f32> = ids.iter().map(|&(_, value)| value).collect();
        let values = if with_values { Some(values.as_slice()) } else { None };
        let eval_params = EvalParameters::new(&self.params, self.num_outcomes());
        let mut dist = vec![0.0; self.num_outcomes()];

        match self.model_type {
            ModelType::Maxent => {
                self.prior.log_prior(&mut dist, &context, values);
                eval::eval(&context, values, &mut dist, &eval_params);
            }
            ModelType::Perceptron => {
                eval::sum_features(eval::active_features(&context, values, &eval_params), &mut dist);
                eval::normalize_scaled(&mut dist);
            }
            ModelType::NaiveBayes => {
                eval::eval_naive_bayes(
                    eval::active_features(&context, values, &eval_params),
                    &self.outcome_totals,
                    self.num_preds() as f64,
                    &mut dist,
                );
            }
        }
        dist
    }

    /// Label of the most probable outcome in `dist`
    pub fn best_outcome(&self, dist: &[f64]) -> &str {
        &self.outcome_names[eval::argmax(dist)]
    }

    /// Render every outcome with its probability, e.g. `A[0.7000] B[0.3000]`
    pub fn all_outcomes(&self, dist: &[f64]) -> String {
        self.outcome_names
            .iter()
            .zip(dist)
            .map(|(name, p)| format!("{}[{:.4}]", name, p))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Load a model written by [`ModelWriter`](crate::train::ModelWriter)
    pub fn from_bytes(buf: &[u8]) -> io::Result<Self> {
        let size = buf.len();
        if size < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid model format",
            ));
        }
        if &buf[0..4] != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid file format, magic mismatch",
            ));
        }
        let mut index = 4;
        let file_size = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let model_type = ModelType::from_tag(&buf[index..index + 4]).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "unknown model type")
        })?;
        index += 4;
        let version = unpack_u32(&buf[index..])?;
        index += 4;
        if version != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported model version {}", version),
            ));
        }
        let num_preds = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let num_outcomes = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let _num_params = unpack_u32(&buf[index..])?;
        index += 4;
        let off_params = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let off_outcomes = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let off_preds = unpack_u32(&buf[index..])? as usize;

        if file_size != size
            || off_params >= off_outcomes
            || off_outcomes >= size
            || off_preds >= size
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "model offsets out of range",
            ));
        }

        let params = Self::read_params(&buf[off_params..off_outcomes], num_preds, num_outcomes)?;
        let outcome_names = Self::read_labels(&buf[off_outcomes..size], num_outcomes)?;
        let pred_labels = Self::read_labels(&buf[off_preds..size], num_preds)?;

        Ok(Self::new(model_type, params, pred_labels, outcome_names))
    }

    fn read_params(buf: &[u8], num_preds: usize, num_outcomes: usize) -> io::Result<Vec<Context>> {
        if buf.len() < CHUNK_SIZE || &buf[0..4] != b"PARM" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing parameter chunk",
            ));
        }
        let count = unpack_u32(&buf[8..])? as usize;
        if count != num_preds {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "parameter chunk does not match predicate count",
            ));
        }
        // Every context takes at least its 4-byte length
        if num_preds > (buf.len() - CHUNK_SIZE) / 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "parameter chunk too short for predicate count",
            ));
        }

        let mut index = CHUNK_SIZE;
        let mut params = Vec::with_capacity(num_preds);
        for _ in 0..num_preds {
            let num_active = unpack_u32(buf.get(index..).unwrap_or_default())? as usize;
            index += 4;
            // 4 bytes of outcome id and 8 bytes of weight per active outcome
            if num_active > buf.len().saturating_sub(index) / 12 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} active outcomes exceed the parameter chunk", num_active),
                ));
            }
            let mut outcomes: Vec<usize> = Vec::with_capacity(num_active);
            for _ in 0..num_active {
                let oid = unpack_u32(buf.get(index..).unwrap_or_default())? as usize;
                if oid >= num_outcomes {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("outcome id {} out of range", oid),
                    ));
                }
                if outcomes.last().map_or(false, |&last| oid <= last) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "outcome ids must be strictly ascending",
                    ));
                }
                outcomes.push(oid);
                index += 4;
            }
            let mut parameters = Vec::with_capacity(num_active);
            for _ in 0..num_active {
                parameters.push(unpack_f64(buf.get(index..).unwrap_or_default())?);
                index += 8;
            }
            params.push(Context::new(outcomes.into(), parameters));
        }
        Ok(params)
    }

    fn read_labels(buf: &[u8], count: usize) -> io::Result<Vec<String>> {
        let db = CQDB::new(buf)?;
        (0..count)
            .map(|id| {
                db.to_str(id as u32)
                    .and_then(|s| s.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("missing label for id {}", id),
                        )
                    })
            })
            .collect()
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "MODEL = {{")?;
        writeln!(w, "  type: {}", self.model_type)?;
        writeln!(w, "  num_outcomes: {}", self.num_outcomes())?;
        writeln!(w, "  num_preds: {}", self.num_preds())?;
        writeln!(w, "}}\n")?;
        writeln!(w, "OUTCOMES = {{")?;
        for (i, name) in self.outcome_names.iter().enumerate() {
            writeln!(w, "  {:>5}: {}", i, name)?;
        }
        writeln!(w, "}}\n")?;
        writeln!(w, "PARAMETERS = {{")?;
        for (pred, context) in self.pred_labels.iter().zip(&self.params) {
            for (&oid, &weight) in context.outcomes().iter().zip(context.parameters()) {
                writeln!(w, "  {} --> {}: {:.6}", pred, self.outcome_names[oid], weight)?;
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}

impl PartialEq for MaxentModel {
    fn eq(&self, other: &Self) -> bool {
        self.model_type == other.model_type
            && self.params == other.params
            && self.pred_labels == other.pred_labels
            && self.outcome_names == other.outcome_names
    }
}
