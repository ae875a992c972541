// WellSleuth - core/mnemonic.rs
//
// Vendor mnemonic → canonical mnemonic standardization.
//
// The alias table is static, process-wide and built once on first use.
// It recognises vendor variants AND the rendered names of every target
// standard, which is what makes `standardize` idempotent even when a file
// is re-run under a different standard.

use crate::core::model::{CurveCategory, LogFile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

// =============================================================================
// Options
// =============================================================================

/// Naming convention the canonical curves are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MnemonicStandard {
    /// Short industry mnemonics (DEPT, GR, NPHI, RHOB...).
    #[default]
    Api,
    /// Self-describing names (DEPTH, GAMMA_RAY, NEUTRON_POROSITY...).
    Descriptive,
}

/// Mnemonic standardization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizationOptions {
    pub enabled: bool,
    pub standard: MnemonicStandard,
    /// When false, the mapping is computed and reported but no curve is renamed.
    pub auto_standardize: bool,
    /// Keep the source mnemonic alongside the canonical one.
    pub preserve_original: bool,
}

impl Default for StandardizationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            standard: MnemonicStandard::Api,
            auto_standardize: true,
            preserve_original: true,
        }
    }
}

// =============================================================================
// Canonical curves
// =============================================================================

/// Curves the alias table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CanonicalCurve {
    Depth,
    GammaRay,
    SpontaneousPotential,
    Caliper,
    BitSize,
    DeepResistivity,
    MediumResistivity,
    ShallowResistivity,
    MicroResistivity,
    NeutronPorosity,
    BulkDensity,
    DensityCorrection,
    Photoelectric,
    CompressionalSonic,
    ShearSonic,
    Tension,
    Temperature,
}

impl CanonicalCurve {
    const ALL: [CanonicalCurve; 17] = [
        CanonicalCurve::Depth,
        CanonicalCurve::GammaRay,
        CanonicalCurve::SpontaneousPotential,
        CanonicalCurve::Caliper,
        CanonicalCurve::BitSize,
        CanonicalCurve::DeepResistivity,
        CanonicalCurve::MediumResistivity,
        CanonicalCurve::ShallowResistivity,
        CanonicalCurve::MicroResistivity,
        CanonicalCurve::NeutronPorosity,
        CanonicalCurve::BulkDensity,
        CanonicalCurve::DensityCorrection,
        CanonicalCurve::Photoelectric,
        CanonicalCurve::CompressionalSonic,
        CanonicalCurve::ShearSonic,
        CanonicalCurve::Tension,
        CanonicalCurve::Temperature,
    ];

    /// Rendered mnemonic under the given standard.
    pub fn mnemonic(&self, standard: MnemonicStandard) -> &'static str {
        match standard {
            MnemonicStandard::Api => self.api_mnemonic(),
            MnemonicStandard::Descriptive => self.descriptive_mnemonic(),
        }
    }

    fn api_mnemonic(&self) -> &'static str {
        match self {
            CanonicalCurve::Depth => "DEPT",
            CanonicalCurve::GammaRay => "GR",
            CanonicalCurve::SpontaneousPotential => "SP",
            CanonicalCurve::Caliper => "CALI",
            CanonicalCurve::BitSize => "BS",
            CanonicalCurve::DeepResistivity => "RT",
            CanonicalCurve::MediumResistivity => "RM",
            CanonicalCurve::ShallowResistivity => "RS",
            CanonicalCurve::MicroResistivity => "RXO",
            CanonicalCurve::NeutronPorosity => "NPHI",
            CanonicalCurve::BulkDensity => "RHOB",
            CanonicalCurve::DensityCorrection => "DRHO",
            CanonicalCurve::Photoelectric => "PEF",
            CanonicalCurve::CompressionalSonic => "DT",
            CanonicalCurve::ShearSonic => "DTS",
            CanonicalCurve::Tension => "TENS",
            CanonicalCurve::Temperature => "TEMP",
        }
    }

    fn descriptive_mnemonic(&self) -> &'static str {
        match self {
            CanonicalCurve::Depth => "DEPTH",
            CanonicalCurve::GammaRay => "GAMMA_RAY",
            CanonicalCurve::SpontaneousPotential => "SPONTANEOUS_POTENTIAL",
            CanonicalCurve::Caliper => "CALIPER",
            CanonicalCurve::BitSize => "BIT_SIZE",
            CanonicalCurve::DeepResistivity => "DEEP_RESISTIVITY",
            CanonicalCurve::MediumResistivity => "MEDIUM_RESISTIVITY",
            CanonicalCurve::ShallowResistivity => "SHALLOW_RESISTIVITY",
            CanonicalCurve::MicroResistivity => "MICRO_RESISTIVITY",
            CanonicalCurve::NeutronPorosity => "NEUTRON_POROSITY",
            CanonicalCurve::BulkDensity => "BULK_DENSITY",
            CanonicalCurve::DensityCorrection => "DENSITY_CORRECTION",
            CanonicalCurve::Photoelectric => "PHOTOELECTRIC_FACTOR",
            CanonicalCurve::CompressionalSonic => "COMPRESSIONAL_SLOWNESS",
            CanonicalCurve::ShearSonic => "SHEAR_SLOWNESS",
            CanonicalCurve::Tension => "TENSION",
            CanonicalCurve::Temperature => "TEMPERATURE",
        }
    }

    /// Vendor and legacy variants mapping to this curve.
    fn vendor_aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalCurve::Depth => &["DEPT", "DEPTH", "DEP", "MD", "TDEP"],
            CanonicalCurve::GammaRay => &["GR", "GRC", "SGR", "CGR", "GAM", "GRGC", "ECGR", "GR_EDTC"],
            CanonicalCurve::SpontaneousPotential => &["SP", "SPC", "SSP"],
            CanonicalCurve::Caliper => &["CALI", "CAL", "CALX", "CALY", "HCAL", "C1", "C13"],
            CanonicalCurve::BitSize => &["BS", "BIT"],
            CanonicalCurve::DeepResistivity => &[
                "RT", "ILD", "LLD", "RD", "RDEP", "RLA5", "AT90", "HDRS", "RILD", "IDPH",
            ],
            CanonicalCurve::MediumResistivity => &["RM", "ILM", "RMED", "AT30", "HMRS", "RILM", "IMPH"],
            CanonicalCurve::ShallowResistivity => &["RS", "LLS", "SFLU", "SFL", "RSHAL", "AT10"],
            CanonicalCurve::MicroResistivity => &["RXO", "MSFL", "MLL", "RXOZ", "RXO8"],
            CanonicalCurve::NeutronPorosity => &["NPHI", "NPOR", "TNPH", "CNL", "NPHS", "PHIN", "CNPOR", "NPL"],
            CanonicalCurve::BulkDensity => &["RHOB", "RHOZ", "DEN", "ZDEN", "DENS", "RHOM"],
            CanonicalCurve::DensityCorrection => &["DRHO", "HDRA", "ZCOR", "DCOR"],
            CanonicalCurve::Photoelectric => &["PEF", "PE", "PEFZ", "PDPE"],
            CanonicalCurve::CompressionalSonic => &["DT", "DTC", "DTCO", "AC", "DT4P", "SONIC"],
            CanonicalCurve::ShearSonic => &["DTS", "DTSM", "DTSH", "DT4S"],
            CanonicalCurve::Tension => &["TENS", "TEN", "TENSION"],
            CanonicalCurve::Temperature => &["TEMP", "MTEM", "BHT", "TEMPERATURE"],
        }
    }

    /// Physical category assigned to curves recognised as this canonical curve.
    pub fn category(&self) -> CurveCategory {
        match self {
            CanonicalCurve::Depth => CurveCategory::Depth,
            CanonicalCurve::GammaRay => CurveCategory::GammaRay,
            CanonicalCurve::SpontaneousPotential => CurveCategory::SpontaneousPotential,
            CanonicalCurve::Caliper | CanonicalCurve::BitSize => CurveCategory::Caliper,
            CanonicalCurve::DeepResistivity
            | CanonicalCurve::MediumResistivity
            | CanonicalCurve::ShallowResistivity
            | CanonicalCurve::MicroResistivity => CurveCategory::Resistivity,
            CanonicalCurve::NeutronPorosity => CurveCategory::NeutronPorosity,
            CanonicalCurve::BulkDensity => CurveCategory::BulkDensity,
            CanonicalCurve::DensityCorrection => CurveCategory::DensityCorrection,
            CanonicalCurve::Photoelectric => CurveCategory::Photoelectric,
            CanonicalCurve::CompressionalSonic | CanonicalCurve::ShearSonic => CurveCategory::Sonic,
            CanonicalCurve::Tension | CanonicalCurve::Temperature => CurveCategory::Generic,
        }
    }
}

/// Upper-cased alias → canonical curve. Built once.
fn alias_table() -> &'static HashMap<&'static str, CanonicalCurve> {
    static TABLE: OnceLock<HashMap<&'static str, CanonicalCurve>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for curve in CanonicalCurve::ALL {
            for alias in curve.vendor_aliases() {
                table.insert(*alias, curve);
            }
            table.insert(curve.api_mnemonic(), curve);
            table.insert(curve.descriptive_mnemonic(), curve);
        }
        table
    })
}

/// Resolve a mnemonic (any case, surrounding whitespace ignored) to its
/// canonical curve.
pub fn lookup(mnemonic: &str) -> Option<CanonicalCurve> {
    let key = mnemonic.trim().to_ascii_uppercase();
    alias_table().get(key.as_str()).copied()
}

/// Physical category for a mnemonic; `Generic` when unrecognised.
pub fn classify(mnemonic: &str) -> CurveCategory {
    lookup(mnemonic)
        .map(|c| c.category())
        .unwrap_or(CurveCategory::Generic)
}

/// Key used for physical-range lookups: the API mnemonic when recognised,
/// otherwise the upper-cased mnemonic itself.
pub fn range_key(mnemonic: &str) -> String {
    match lookup(mnemonic) {
        Some(curve) => curve.api_mnemonic().to_string(),
        None => mnemonic.trim().to_ascii_uppercase(),
    }
}

// =============================================================================
// Standardization
// =============================================================================

/// One planned or applied rename.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MnemonicChange {
    pub original: String,
    pub canonical: String,
}

/// Outcome of a standardization pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizationResult {
    pub standard: MnemonicStandard,
    /// Whether renames were applied (false for a dry run).
    pub applied: bool,
    pub renamed: Vec<MnemonicChange>,
    pub already_standard: Vec<String>,
    /// Mnemonics the alias table does not recognise; passed through unchanged.
    pub non_standard: Vec<String>,
    /// Mnemonics left unchanged because their canonical name is already taken.
    pub conflicts: Vec<MnemonicChange>,
}

/// Rewrite every recognised curve mnemonic to its canonical form.
///
/// Idempotent: a second pass over the output finds every recognised curve
/// already standard and changes nothing.
pub fn standardize(file: &mut LogFile, options: &StandardizationOptions) -> StandardizationResult {
    let mut result = StandardizationResult {
        standard: options.standard,
        applied: options.auto_standardize,
        renamed: Vec::new(),
        already_standard: Vec::new(),
        non_standard: Vec::new(),
        conflicts: Vec::new(),
    };

    for index in 0..file.curves.len() {
        let current = file.curves[index].mnemonic.clone();
        let Some(canonical) = lookup(&current) else {
            result.non_standard.push(current);
            continue;
        };

        let target = canonical.mnemonic(options.standard);
        if current == target {
            result.already_standard.push(current);
            continue;
        }

        let taken = file
            .curves
            .iter()
            .enumerate()
            .any(|(j, c)| j != index && c.mnemonic.eq_ignore_ascii_case(target));
        let change = MnemonicChange {
            original: current,
            canonical: target.to_string(),
        };
        if taken {
            result.conflicts.push(change);
            continue;
        }

        if options.auto_standardize {
            let curve = &mut file.curves[index];
            if options.preserve_original && curve.original_mnemonic.is_none() {
                curve.original_mnemonic = Some(change.original.clone());
            }
            curve.mnemonic = change.canonical.clone();
        }
        result.renamed.push(change);
    }

    tracing::debug!(
        file = %file.filename,
        renamed = result.renamed.len(),
        non_standard = result.non_standard.len(),
        conflicts = result.conflicts.len(),
        applied = result.applied,
        "Mnemonic standardization complete"
    );

    result
}
