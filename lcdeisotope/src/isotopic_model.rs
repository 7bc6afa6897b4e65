/*! Isotopic models and the theoretical isotope abundance table derived from them */
use chemical_elements::isotopic_pattern::{
    BafflingRecursiveIsotopicPatternGenerator, TheoreticalIsotopicPattern,
};
use chemical_elements::{ChemicalComposition, ElementSpecification, PROTON as _PROTON};

use tracing::debug;

use crate::error::DeisotopeError;

/// The mass of H+, a hydrogen atom minus an electron
pub const PROTON: f64 = _PROTON;

/// The mass difference between isotopes `C[13]` and `C[12]`. Not precisely universal, but the
/// majority of expected applications are carbon-based
pub const NEUTRON_SHIFT: f64 = 1.0033548378;

const ISOTOPIC_SHIFT: [f64; 10] = [
    NEUTRON_SHIFT / 1.0,
    NEUTRON_SHIFT / 2.0,
    NEUTRON_SHIFT / 3.0,
    NEUTRON_SHIFT / 4.0,
    NEUTRON_SHIFT / 5.0,
    NEUTRON_SHIFT / 6.0,
    NEUTRON_SHIFT / 7.0,
    NEUTRON_SHIFT / 8.0,
    NEUTRON_SHIFT / 9.0,
    NEUTRON_SHIFT / 10.0,
];

/// Get the m/z difference between isotopic peaks at a given charge state
#[inline(always)]
pub fn isotopic_shift(charge: i32) -> f64 {
    if charge > 0 && charge < 11 {
        ISOTOPIC_SHIFT[(charge - 1) as usize]
    } else {
        NEUTRON_SHIFT / charge as f64
    }
}

/// Convert a protonated m/z to a neutral mass
#[inline]
pub fn neutral_mass(mz: f64, charge: i32) -> f64 {
    (mz - PROTON) * charge as f64
}

/// Convert a neutral mass to the m/z of its protonated ion
#[inline]
pub fn mass_charge_ratio(neutral_mass: f64, charge: i32) -> f64 {
    neutral_mass / charge as f64 + PROTON
}

/// A model for converting a neutral mass into a theoretical isotopic pattern based upon
/// an "average monomer" and linear extension.
///
/// This is an implementation of Senko's Averagine [^1]
///
/// # References
/// [^1]: Senko M, Beu S, McLafferty F: Determination of Monoisotopic Masses and Ion
///       Populations for Large Biomolecules from Resolved Isotopic Distributions.
///       Journal of the American Society for Mass Spectrometry 1995, 6:229-233
///       <https://doi.org/10.1016/1044-0305(95)00017-8>
#[derive(Debug, Clone)]
pub struct IsotopicModel {
    /// The "average" monomer composition with fractional element counts
    pub base_composition: Vec<(ElementSpecification<'static>, f64)>,
    /// The mass of the average monomer to interpolate with
    pub base_mass: f64,
    hydrogen: Option<ElementSpecification<'static>>,
    generator: BafflingRecursiveIsotopicPatternGenerator<'static>,
}

impl PartialEq for IsotopicModel {
    fn eq(&self, other: &Self) -> bool {
        self.base_composition == other.base_composition
    }
}

impl IsotopicModel {
    pub fn new(base_composition: Vec<(ElementSpecification<'static>, f64)>) -> Self {
        let base_mass = base_composition
            .iter()
            .map(|(e, c)| e.element.most_abundant_mass * *c)
            .sum();
        Self {
            base_composition,
            base_mass,
            hydrogen: "H".parse().ok(),
            generator: BafflingRecursiveIsotopicPatternGenerator::new(),
        }
    }

    /// Build an integral composition whose mass approximates `neutral`, using hydrogen
    /// to absorb the rounding error.
    pub fn scale(&self, neutral: f64) -> ChemicalComposition<'static> {
        let scale = neutral / self.base_mass;

        let mut scaled = ChemicalComposition::new();
        for (elt, count) in self.base_composition.iter() {
            scaled.set(*elt, (*count * scale).round() as i32);
        }
        let delta = (scaled.mass() - neutral).round() as i32;
        if let Some(hydrogen) = self.hydrogen.as_ref() {
            let hydrogens = scaled[hydrogen];
            if hydrogens > delta {
                scaled[hydrogen] -= delta;
            } else {
                scaled[hydrogen] = 0;
            }
        }
        scaled
    }

    /// Generate the relative abundances of the isotopic peaks of a molecule of
    /// mass `neutral`, starting from the monoisotopic peak and summing to 1.
    pub fn relative_abundances(
        &mut self,
        neutral: f64,
        truncate_after: f64,
        ignore_below: f64,
    ) -> Vec<f64> {
        let composition = self.scale(neutral);
        let peaks = self
            .generator
            .isotopic_variants(composition, 0, 1, PROTON);
        let pattern = TheoreticalIsotopicPattern::from(peaks)
            .truncate_after(truncate_after)
            .ignore_below(ignore_below);
        let abundances: Vec<f64> = pattern.iter().map(|p| p.intensity).collect();
        let total: f64 = abundances.iter().sum();
        if total > 0.0 {
            abundances.into_iter().map(|a| a / total).collect()
        } else {
            vec![1.0]
        }
    }
}

impl<T: IntoIterator<Item = (&'static str, f64)>> From<T> for IsotopicModel {
    fn from(iter: T) -> Self {
        let composition = iter
            .into_iter()
            .filter_map(|(e, c)| e.parse().ok().map(|e| (e, c)))
            .collect();
        IsotopicModel::new(composition)
    }
}

/// A set of named average monomer isotopic models for biomolecules. Variants convert to
/// [`IsotopicModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsotopicModels {
    #[default]
    Peptide,
    Glycan,
    Glycopeptide,
    PermethylatedGlycan,
    Heparin,
    HeparanSulfate,
}

impl From<IsotopicModels> for IsotopicModel {
    fn from(source: IsotopicModels) -> IsotopicModel {
        match source {
            IsotopicModels::Peptide => vec![
                ("H", 7.7583f64),
                ("C", 4.9384),
                ("S", 0.0417),
                ("O", 1.4773),
                ("N", 1.3577),
            ],
            IsotopicModels::Glycan => vec![("H", 11.8333), ("C", 7.0), ("O", 5.16666), ("N", 0.5)],
            IsotopicModels::Glycopeptide => vec![
                ("H", 15.75),
                ("C", 10.93),
                ("S", 0.02054),
                ("O", 6.4773),
                ("N", 1.6577),
            ],
            IsotopicModels::PermethylatedGlycan => {
                vec![("C", 12.0), ("H", 21.8333), ("N", 0.5), ("O", 5.16666)]
            }
            IsotopicModels::Heparin => {
                vec![("H", 10.5), ("C", 6.0), ("S", 0.5), ("O", 5.5), ("N", 0.5)]
            }
            IsotopicModels::HeparanSulfate => vec![
                ("H", 10.667),
                ("C", 6.0),
                ("S", 1.333),
                ("O", 9.0),
                ("N", 0.667),
            ],
        }
        .into()
    }
}

/// How to build an [`IsotopeTable`] from an averagine model
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IsotopeTableParams {
    pub model: IsotopicModels,
    /// The width of each neutral mass bin in Da
    pub mass_step: f64,
    /// The largest neutral mass the table covers. Heavier masses use the last bin.
    pub max_mass: f64,
    /// The cumulative abundance of isotopic signal to retain
    pub truncate_after: f64,
    /// The minimum abundance an isotopic peak must have to be kept
    pub ignore_below: f64,
}

impl Default for IsotopeTableParams {
    fn default() -> Self {
        Self {
            model: IsotopicModels::Peptide,
            mass_step: 50.0,
            max_mass: 10000.0,
            truncate_after: 0.95,
            ignore_below: 0.001,
        }
    }
}

impl IsotopeTableParams {
    pub fn build(&self) -> Result<IsotopeTable, DeisotopeError> {
        let mut model: IsotopicModel = self.model.into();
        IsotopeTable::from_model(
            &mut model,
            self.mass_step,
            self.max_mass,
            self.truncate_after,
            self.ignore_below,
        )
    }
}

/// Theoretical relative isotopic abundances, binned by neutral mass.
///
/// Row `i` covers neutral masses in `[i * mass_step, (i + 1) * mass_step)`, and
/// each row starts at the monoisotopic peak and sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeTable {
    mass_step: f64,
    rows: Vec<Vec<f64>>,
}

impl IsotopeTable {
    /// Create a table from explicit rows of abundances, normalizing each row.
    pub fn new(mass_step: f64, rows: Vec<Vec<f64>>) -> Result<Self, DeisotopeError> {
        if !(mass_step.is_finite() && mass_step > 0.0) {
            return Err(DeisotopeError::InvalidIsotopeTable(format!(
                "mass step must be positive, got {mass_step}"
            )));
        }
        if rows.is_empty() {
            return Err(DeisotopeError::InvalidIsotopeTable(
                "the table has no rows".to_string(),
            ));
        }
        let mut normalized = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.iter().any(|a| !(a.is_finite() && *a >= 0.0)) {
                return Err(DeisotopeError::InvalidIsotopeTable(format!(
                    "row {i} contains a negative or non-finite abundance"
                )));
            }
            let total: f64 = row.iter().sum();
            if total <= 0.0 {
                return Err(DeisotopeError::InvalidIsotopeTable(format!(
                    "row {i} has no abundance"
                )));
            }
            normalized.push(row.into_iter().map(|a| a / total).collect());
        }
        Ok(Self {
            mass_step,
            rows: normalized,
        })
    }

    /// Generate a table by evaluating `model` at the center of each mass bin up to `max_mass`
    pub fn from_model(
        model: &mut IsotopicModel,
        mass_step: f64,
        max_mass: f64,
        truncate_after: f64,
        ignore_below: f64,
    ) -> Result<Self, DeisotopeError> {
        if !(mass_step.is_finite() && mass_step > 0.0) || !(max_mass >= mass_step) {
            return Err(DeisotopeError::InvalidIsotopeTable(format!(
                "cannot bin masses up to {max_mass} in steps of {mass_step}"
            )));
        }
        if !(truncate_after > 0.0 && truncate_after <= 1.0) {
            return Err(DeisotopeError::InvalidIsotopeTable(format!(
                "truncate_after must be in (0, 1], got {truncate_after}"
            )));
        }
        let rows = generate_rows(model, mass_step, max_mass, truncate_after, ignore_below);
        debug!(
            "Generated an isotope table with {} bins of {mass_step} Da, longest pattern has {} peaks",
            rows.len(),
            rows.iter().map(|r| r.len()).max().unwrap_or_default()
        );
        Self::new(mass_step, rows)
    }

    pub fn mass_step(&self) -> f64 {
        self.mass_step
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The bin a neutral mass falls into, clamped to the table's extent
    pub fn bin_for(&self, neutral_mass: f64) -> usize {
        if !(neutral_mass > 0.0) {
            return 0;
        }
        let i = (neutral_mass / self.mass_step) as usize;
        i.min(self.rows.len().saturating_sub(1))
    }

    /// The relative abundances expected for a molecule of `neutral_mass`
    pub fn abundances(&self, neutral_mass: f64) -> &[f64] {
        &self.rows[self.bin_for(neutral_mass)]
    }
}

impl Default for IsotopeTable {
    fn default() -> Self {
        let params = IsotopeTableParams::default();
        let mut model: IsotopicModel = params.model.into();
        Self {
            mass_step: params.mass_step,
            rows: generate_rows(
                &mut model,
                params.mass_step,
                params.max_mass,
                params.truncate_after,
                params.ignore_below,
            ),
        }
    }
}

fn generate_rows(
    model: &mut IsotopicModel,
    mass_step: f64,
    max_mass: f64,
    truncate_after: f64,
    ignore_below: f64,
) -> Vec<Vec<f64>> {
    let n_bins = (max_mass / mass_step).ceil() as usize;
    (0..n_bins)
        .map(|i| {
            let center = (i as f64 + 0.5) * mass_step;
            model.relative_abundances(center, truncate_after, ignore_below)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conversions() {
        let mass = neutral_mass(1000.0, 2);
        assert!((mass - (2000.0 - 2.0 * PROTON)).abs() < 1e-9);
        assert!((mass_charge_ratio(mass, 2) - 1000.0).abs() < 1e-9);
        assert!((isotopic_shift(2) - 0.5016774189).abs() < 1e-9);
        assert!((isotopic_shift(12) - NEUTRON_SHIFT / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_composition() {
        let model: IsotopicModel = IsotopicModels::Peptide.into();
        assert_eq!(model.base_composition.len(), 5);
        assert!((model.base_mass - 111.1).abs() < 1.0, "{}", model.base_mass);
    }

    #[test]
    fn test_relative_abundances() {
        let mut model: IsotopicModel = IsotopicModels::Peptide.into();
        let small = model.relative_abundances(525.0, 0.95, 0.001);
        assert!((small.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(small[0] > small[1]);

        let large = model.relative_abundances(5000.0, 0.95, 0.001);
        assert!(large.len() > small.len());
        assert!(large[0] < large[1]);
    }

    #[test]
    fn test_explicit_table() {
        let table = IsotopeTable::new(
            100.0,
            vec![vec![6.0, 3.0, 1.0], vec![0.33, 0.36, 0.21, 0.10]],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.bin_for(50.0), 0);
        assert_eq!(table.bin_for(150.0), 1);
        assert_eq!(table.bin_for(15000.0), 1);
        assert_eq!(table.bin_for(-1.0), 0);
        let row = table.abundances(50.0);
        assert!((row[0] - 0.6).abs() < 1e-12);
        assert_eq!(table.abundances(1e6).len(), 4);

        assert!(IsotopeTable::new(0.0, vec![vec![1.0]]).is_err());
        assert!(IsotopeTable::new(50.0, vec![]).is_err());
        assert!(IsotopeTable::new(50.0, vec![vec![1.0, -0.1]]).is_err());
        assert!(IsotopeTable::new(50.0, vec![vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn test_generated_table() {
        let params = IsotopeTableParams {
            max_mass: 3000.0,
            ..Default::default()
        };
        let table = params.build().unwrap();
        assert_eq!(table.len(), 60);
        let row = table.abundances(neutral_mass(1000.0, 2));
        assert!(row.len() >= 3);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(row[0] > 0.2 && row[0] < 0.45, "{row:?}");
    }
}
