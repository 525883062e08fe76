// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::DEFAULT_MAX_GROUP_IDS,
};
use ::std::{
    env,
    fs::File,
    io::Read,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Scheduling core options.
mod pcontainer_config {
    pub const SECTION_NAME: &str = "pcontainer";
    // Upper bound on the number of distinct group identifiers.
    pub const MAX_GROUP_IDS: &str = "max_group_ids";
}

/// Environment variable that selects the configuration file.
const CONFIG_PATH_VAR: &str = "CONFIG_PATH";

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: String) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        File::open(config_path)?.read_to_string(&mut config_s)?;
        let mut config: Vec<Yaml> = match YamlLoader::load_from_str(&config_s) {
            Ok(config) => config,
            Err(_) => return Err(Fail::new(libc::EINVAL, "malformed configuration file")),
        };
        match config.pop() {
            Some(config_obj) => Ok(Self(config_obj)),
            None => Err(Fail::new(libc::EINVAL, "empty configuration file")),
        }
    }

    /// Builds a configuration from the file named by `CONFIG_PATH`, or an all-defaults
    /// configuration when the variable is not set.
    pub fn from_env() -> Result<Self, Fail> {
        match env::var(CONFIG_PATH_VAR) {
            Ok(config_path) => Self::new(config_path),
            Err(_) => Ok(Self(Yaml::Null)),
        }
    }

    /// Upper bound on the number of distinct group identifiers (default: 10 000).
    pub fn max_group_ids(&self) -> Result<u64, Fail> {
        let value: &Yaml = &self.0[pcontainer_config::SECTION_NAME][pcontainer_config::MAX_GROUP_IDS];
        match value {
            Yaml::BadValue => Ok(DEFAULT_MAX_GROUP_IDS),
            Yaml::Integer(max_group_ids) if *max_group_ids > 0 => Ok(*max_group_ids as u64),
            _ => Err(Fail::new(
                libc::EINVAL,
                "max_group_ids must be a positive integer",
            )),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
