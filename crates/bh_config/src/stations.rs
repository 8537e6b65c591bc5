// crates/bh_config/src/stations.rs

//! 站点文件
//!
//! JSON 数组，每个元素为一个 [`Station`]：
//!
//! ```json
//! [
//!   { "id": "UpperClearing", "x": 626890.0, "y": 5632540.0, "elevation": 1845.0,
//!     "series": { "t": { "times": ["2020-01-01T00:00:00"], "values": [-4.2] } } }
//! ]
//! ```

use bh_forcing::Station;
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;

/// 读取并校验站点文件
pub fn load_stations<P: AsRef<Path>>(path: P) -> Result<Vec<Station>, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_stations(&content)
}

/// 解析站点 JSON
pub fn parse_stations(json: &str) -> Result<Vec<Station>, ConfigError> {
    let stations: Vec<Station> = serde_json::from_str(json)?;
    let mut ids = HashSet::new();
    for (i, s) in stations.iter().enumerate() {
        s.validate()
            .map_err(|e| ConfigError::invalid(format!("stations[{}]", i), s.id(), e.to_string()))?;
        if !ids.insert(s.id()) {
            return Err(ConfigError::invalid(format!("stations[{}].id", i), s.id(), "站点标识重复"));
        }
    }
    Ok(stations)
}
