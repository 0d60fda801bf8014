//! Binary ideal-solution mineral models and the embedded default dataset.

use crate::equilibrium::phase::{MacroState, Phase};
use crate::error::{TracerError, TracerResult};
use crate::json_parser::JsonParser;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_DATASET_KEY: &str = "ideal_minerals";
const DEFAULT_DATASET: &str = include_str!("../../data/ideal_minerals.json");

/// One end-member with a linear Gibbs energy `G = H - T S + P V`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndMember {
    pub name: String,
    /// Site species this end-member puts on the mixing site.
    pub species: String,
    pub enthalpy: f64,
    pub entropy: f64,
    pub volume: f64,
}

impl EndMember {
    pub fn gibbs(&self, state: &MacroState) -> f64 {
        self.enthalpy - state.temperature * self.entropy + state.pressure * self.volume
    }
}

/// A two end-member ideal solid solution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionModel {
    pub name: String,
    pub end_members: Vec<EndMember>,
}

impl SolutionModel {
    pub fn validate(&self) -> TracerResult<()> {
        if self.end_members.len() != 2 {
            return Err(TracerError::Config(format!(
                "model {} needs exactly two end-members, found {}",
                self.name,
                self.end_members.len()
            )));
        }
        if self.end_members[0].species == self.end_members[1].species {
            return Err(TracerError::Config(format!(
                "model {} puts the same species on both end-members",
                self.name
            )));
        }
        let finite = self
            .end_members
            .iter()
            .all(|m| m.enthalpy.is_finite() && m.entropy.is_finite() && m.volume.is_finite());
        if !finite {
            return Err(TracerError::Config(format!("model {} has non-finite parameters", self.name)));
        }
        Ok(())
    }

    pub fn species(&self) -> Vec<&str> {
        self.end_members.iter().map(|m| m.species.as_str()).collect()
    }

    /// Does `phase` use this model's site species in this model's order?
    pub fn matches(&self, phase: &Phase) -> bool {
        phase.species.len() == self.end_members.len()
            && phase.species.iter().zip(&self.end_members).all(|(s, m)| *s == m.species)
    }

    /// A phase of this model with minor end-member fraction `x`.
    pub fn phase(&self, x: f64) -> TracerResult<Phase> {
        let species = self.species();
        Phase::binary(&self.name, species[0], species[1], x)
    }

    pub fn gibbs(&self, end_member: usize, state: &MacroState) -> f64 {
        self.end_members[end_member].gibbs(state)
    }
}

#[derive(Deserialize)]
struct Dataset {
    models: Vec<SolutionModel>,
}

fn parse_dataset(json: serde_json::Value) -> TracerResult<Vec<SolutionModel>> {
    let dataset: Dataset = serde_json::from_value(json)?;
    for model in &dataset.models {
        model.validate()?;
    }
    Ok(dataset.models)
}

/// Models from the embedded dataset, keyed by name
static DEFAULT_MODELS: Lazy<Result<HashMap<String, SolutionModel>, String>> = Lazy::new(|| {
    JsonParser::load_json_str(DEFAULT_DATASET_KEY, DEFAULT_DATASET)
        .and_then(parse_dataset)
        .map(|models| models.into_iter().map(|m| (m.name.clone(), m)).collect())
        .map_err(|e| e.to_string())
});

pub fn default_models() -> TracerResult<&'static HashMap<String, SolutionModel>> {
    DEFAULT_MODELS
        .as_ref()
        .map_err(|e| TracerError::Config(format!("embedded mineral dataset is invalid: {}", e)))
}

/// Look up a model from the embedded dataset
pub fn get_model(name: &str) -> TracerResult<&'static SolutionModel> {
    default_models()?
        .get(name)
        .ok_or_else(|| TracerError::UnknownPhase(name.to_string()))
}

/// Load models from a dataset file with the same layout as the embedded one
pub fn load_models<P: AsRef<Path>>(path: P) -> TracerResult<Vec<SolutionModel>> {
    parse_dataset(JsonParser::load_json(path)?)
}
