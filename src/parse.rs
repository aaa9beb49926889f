//! Parses instances and run parameters from TOML files

use std::{fs, path::Path};

use serde::de::DeserializeOwned;

use crate::{
    error::ParseError,
    params::RunParams,
    problem::{InstanceDescription, ZoneGraph},
};

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ParseError> {
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|source| ParseError::Io { path: display.clone(), source })?;
    toml::from_str(&contents).map_err(|source| ParseError::Toml { path: display, source })
}

/// Reads an instance description, in TOML format
pub fn parse_instance_description(path: impl AsRef<Path>) -> Result<InstanceDescription, ParseError> {
    read_toml(path.as_ref())
}

/// Reads and validates an instance
pub fn parse_instance(path: impl AsRef<Path>) -> crate::error::Result<ZoneGraph> {
    Ok(ZoneGraph::new(parse_instance_description(path)?)?)
}

/// Saves an instance description in TOML format to a file
pub fn save_instance(path: impl AsRef<Path>, description: &InstanceDescription) -> Result<(), ParseError> {
    let path = path.as_ref();
    let contents = toml::to_string(description)?;
    fs::write(path, contents).map_err(|source| ParseError::Io { path: path.display().to_string(), source })
}

/// Reads run parameters and checks they are usable
pub fn parse_params(path: impl AsRef<Path>) -> Result<RunParams, ParseError> {
    let params: RunParams = read_toml(path.as_ref())?;
    params.validate()?;
    Ok(params)
}
