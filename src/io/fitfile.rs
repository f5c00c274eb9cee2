//! Saved fit documents.
//!
//! A fit file is the JSON-serialised [`FitFile`]: everything needed to
//! re-plot or compare a single-window fit without re-reading the grid.

use std::fs;
use std::path::Path;

use crate::domain::FitFile;
use crate::error::AppError;

/// Name written into the `tool` field of every fit file.
pub const TOOL_NAME: &str = "curie-depth";

pub fn write_fit(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(fit)
        .map_err(|e| AppError::new(3, format!("Cannot serialise fit: {e}")))?;
    fs::write(path, json)
        .map_err(|e| AppError::new(3, format!("Cannot write {}: {e}", path.display())))
}

pub fn read_fit(path: &Path) -> Result<FitFile, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(3, format!("Cannot read {}: {e}", path.display())))?;
    let fit: FitFile = serde_json::from_str(&text)
        .map_err(|e| AppError::new(3, format!("{} is not a fit file: {e}", path.display())))?;
    if fit.tool != TOOL_NAME {
        return Err(AppError::new(
            3,
            format!("{} was written by {:?}, not {TOOL_NAME}.", path.display(), fit.tool),
        ));
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BouligandFit, BouligandParams, FitQuality, MethodSpec, RadialSpectrum, Taper,
    };
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("curie-fitfile-{}-{name}", std::process::id()))
    }

    fn demo_fit() -> FitFile {
        FitFile {
            tool: TOOL_NAME.to_string(),
            method: MethodSpec::Bouligand,
            xc: 100e3,
            yc: 120e3,
            window: 200e3,
            taper: Taper::Hanning,
            bouligand: Some(BouligandFit {
                params: BouligandParams {
                    beta: 3.0,
                    zt: 1.1,
                    dz: 19.0,
                    c: 5.2,
                },
                quality: FitQuality {
                    objective: 14.0,
                    rms: 0.9,
                    n_bins: 25,
                },
            }),
            mcmc: None,
            tanaka: None,
            maus: None,
            spectrum: RadialSpectrum {
                k: vec![0.05, 0.1, 0.15],
                power: vec![12.0, 10.0, 8.5],
                sigma: vec![0.5, 0.4, 0.4],
                counts: vec![8, 16, 24],
            },
        }
    }

    #[test]
    fn fit_files_round_trip() {
        let path = scratch("roundtrip.json");
        let fit = demo_fit();
        write_fit(&path, &fit).unwrap();
        let back = read_fit(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let (a, b) = (fit.bouligand.unwrap(), back.bouligand.unwrap());
        assert_eq!(a.params.zt, b.params.zt);
        assert_eq!(fit.spectrum.k, back.spectrum.k);
        assert_eq!(back.method, MethodSpec::Bouligand);
    }

    #[test]
    fn foreign_json_is_rejected() {
        let path = scratch("foreign.json");
        std::fs::write(&path, "{\"tool\": \"other\"}").unwrap();
        let err = read_fit(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.exit_code(), 3);
    }
}
