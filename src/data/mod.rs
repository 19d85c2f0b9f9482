use std::{fs, path::Path};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{DataError, DatasetError},
    types::{MagnitudeSample, PeriodKey},
};

/// One input region: identity, grouping, geographic anchor and history.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionRecord {
    pub id: String,
    pub group_key: String,
    pub lat: f64,
    pub lon: f64,
    pub series: Vec<MagnitudeSample>,
}

/// Parsed records plus the irregularities found while normalizing them.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub records: Vec<RegionRecord>,
    pub issues: Vec<DataError>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "uf")]
    id: String,
    #[serde(alias = "region", alias = "groupKey")]
    group: String,
    #[serde(alias = "homeLat")]
    lat: f64,
    #[serde(alias = "homeLon")]
    lon: f64,
    #[serde(default, alias = "record", alias = "magnitudeSeries")]
    series: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(alias = "year")]
    period: PeriodKey,
    #[serde(default, alias = "numberOfCases")]
    value: Value,
}

impl Dataset {
    /// Accepts an array of records. Field names of the original case files
    /// (`uf`, `region`, `record`, `year`, `numberOfCases`) are accepted as aliases.
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        let raw: Vec<RawRecord> = serde_json::from_str(json)?;
        let mut issues = Vec::new();
        let records = raw
            .into_iter()
            .map(|record| normalize(record, &mut issues))
            .collect();
        for issue in &issues {
            warn!(target: "casecycle::data", %issue, "dataset.irregular_value");
        }
        Ok(Self { records, issues })
    }

    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let contents = fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_json_str(&contents)?;
        info!(
            target: "casecycle::data",
            path = %path.display(),
            records = dataset.records.len(),
            issues = dataset.issues.len(),
            "dataset.loaded=file"
        );
        Ok(dataset)
    }

    /// The 27 Brazilian federative units anchored at their capitals, with
    /// synthetic yearly case counts drawn from a seeded generator.
    pub fn demo(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let records = DEMO_UNITS
            .iter()
            .map(|&(id, group, lat, lon)| {
                let mut level: f64 = rng.gen_range(1_000.0..120_000.0);
                let series = DEMO_YEARS
                    .map(|period| {
                        level *= rng.gen_range(0.55..1.7);
                        MagnitudeSample {
                            period,
                            value: Some(level.round()),
                        }
                    })
                    .collect();
                RegionRecord {
                    id: id.to_string(),
                    group_key: group.to_string(),
                    lat,
                    lon,
                    series,
                }
            })
            .collect();
        Self {
            records,
            issues: Vec::new(),
        }
    }
}

fn normalize(raw: RawRecord, issues: &mut Vec<DataError>) -> RegionRecord {
    let series = raw
        .series
        .into_iter()
        .map(|sample| {
            let value = match numeric(&sample.value) {
                None => {
                    issues.push(DataError::NonNumeric {
                        id: raw.id.clone(),
                        period: sample.period,
                    });
                    None
                }
                Some(v) if v < 0.0 => {
                    issues.push(DataError::Negative {
                        id: raw.id.clone(),
                        period: sample.period,
                    });
                    None
                }
                Some(v) => Some(v),
            };
            MagnitudeSample {
                period: sample.period,
                value,
            }
        })
        .collect();
    RegionRecord {
        id: raw.id,
        group_key: raw.group,
        lat: raw.lat,
        lon: raw.lon,
        series,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

const DEMO_YEARS: std::ops::RangeInclusive<PeriodKey> = 2010..=2015;

const DEMO_UNITS: [(&str, &str, f64, f64); 27] = [
    ("AC", "Norte", -9.97, -67.81),
    ("AL", "Nordeste", -9.67, -35.74),
    ("AP", "Norte", 0.03, -51.07),
    ("AM", "Norte", -3.10, -60.02),
    ("BA", "Nordeste", -12.97, -38.50),
    ("CE", "Nordeste", -3.72, -38.54),
    ("DF", "Centro-Oeste", -15.79, -47.88),
    ("ES", "Sudeste", -20.32, -40.34),
    ("GO", "Centro-Oeste", -16.68, -49.25),
    ("MA", "Nordeste", -2.53, -44.30),
    ("MT", "Centro-Oeste", -15.60, -56.10),
    ("MS", "Centro-Oeste", -20.47, -54.62),
    ("MG", "Sudeste", -19.92, -43.94),
    ("PA", "Norte", -1.46, -48.49),
    ("PB", "Nordeste", -7.12, -34.86),
    ("PR", "Sul", -25.43, -49.27),
    ("PE", "Nordeste", -8.05, -34.88),
    ("PI", "Nordeste", -5.09, -42.80),
    ("RJ", "Sudeste", -22.91, -43.17),
    ("RN", "Nordeste", -5.79, -35.21),
    ("RS", "Sul", -30.03, -51.23),
    ("RO", "Norte", -8.76, -63.90),
    ("RR", "Norte", 2.82, -60.67),
    ("SC", "Sul", -27.60, -48.55),
    ("SP", "Sudeste", -23.55, -46.63),
    ("SE", "Nordeste", -10.91, -37.07),
    ("TO", "Norte", -10.18, -48.33),
];
