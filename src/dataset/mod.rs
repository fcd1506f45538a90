//! Synthetic input generator for load testing

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Header row of generated files
pub const HEADER: [&str; 4] = ["Hospital", "Diagnosis", "Treatment", "Recovery Time"];

pub const HOSPITALS: &[&str] = &[
    "General Hospital",
    "City Hospital",
    "Northside Hospital",
    "West End Medical Center",
    "Southside Clinic",
    "Eastside Health Center",
    "Pine Valley Hospital",
    "Lakeside Medical",
    "Riverside Hospital",
    "Greenwood Medical Center",
    "Downtown Medical Plaza",
    "Suburban Hospital",
    "Mountain View Health",
    "Oceanview Clinic",
    "Uptown Medical",
    "Hilltop Hospital",
    "Metro Health Clinic",
    "Parkview Hospital",
    "Sunrise Medical Center",
    "Grandview Hospital",
];

pub const DIAGNOSES: &[&str] = &[
    "Hypertension",
    "Diabetes",
    "Asthma",
    "Pneumonia",
    "COVID-19",
    "Heart Disease",
    "Chronic Kidney Disease",
    "Stroke",
    "COPD",
    "Cancer",
    "Anxiety",
    "Depression",
    "Arthritis",
    "Obesity",
    "Alzheimer",
    "Epilepsy",
    "Migraine",
    "Tuberculosis",
    "Liver Cirrhosis",
    "Leukemia",
];

pub const TREATMENTS: &[&str] = &[
    "Medication A",
    "Medication B",
    "Therapy A",
    "Therapy B",
    "Surgery A",
    "Surgery B",
    "Rehabilitation A",
    "Rehabilitation B",
    "Medication C",
    "Therapy C",
    "Surgery C",
    "Rehabilitation C",
    "Medication D",
    "Therapy D",
    "Surgery D",
];

/// Recovery times are whole days in this range
pub const RECOVERY_DAYS: std::ops::RangeInclusive<u32> = 5..=60;

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

/// Write a header and `rows` random rows to `writer`
pub fn write_rows<W: Write, R: Rng>(writer: W, rows: u64, rng: &mut R) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    for _ in 0..rows {
        let days = rng.random_range(RECOVERY_DAYS).to_string();
        csv.write_record([
            pick(rng, HOSPITALS),
            pick(rng, DIAGNOSES),
            pick(rng, TREATMENTS),
            days.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Generate a CSV file at `output`.
///
/// The same `seed` always produces the same file; without one the
/// generator is seeded from the OS.
pub fn generate(output: &Path, rows: u64, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_rows(BufWriter::new(file), rows, &mut rng)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Generated {} rows in {}", rows, output.display());
    Ok(())
}
