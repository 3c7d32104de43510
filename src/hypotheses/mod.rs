//! # Top-quark decay hypotheses
//!
//! This module turns a physical decay hypothesis into a configured [`KinFitter`]:
//! the decay channel fixes which objects take part in the fit, [`TopFitConfig`] chooses a
//! parametrization per object class and the list of mass constraints to impose.
//!
//! ## Channels and objects
//!
//! | Channel                         | Objects, in candidate order |
//! |---------------------------------|-----------------------------|
//! | [`DecayChannel::SemiLeptonic`]  | `HadB, HadP, HadQ, LepB, Lepton, Neutrino` |
//! | [`DecayChannel::FullHadronic`]  | `B, BBar, LightQ, LightQBar, LightP, LightPBar` |
//! | [`DecayChannel::SingleTop`]     | `Bottom, Light, Lepton, Neutrino` |
//!
//! Jets use [`TopFitConfig::jet_parametrization`], the charged lepton
//! [`TopFitConfig::lepton_parametrization`] and the neutrino (missing transverse energy)
//! [`TopFitConfig::met_parametrization`].
//!
//! ## Constraints
//!
//! | Constraint      | Semi-leptonic         | Full-hadronic               | Single top           |
//! |-----------------|-----------------------|-----------------------------|----------------------|
//! | `WHadMass`      | `HadP+HadQ` (1)       | –                           | –                    |
//! | `WLepMass`      | `Lepton+Neutrino` (2) | –                           | `Lepton+Neutrino` (1)|
//! | `TopHadMass`    | `HadP+HadQ+HadB` (3)  | –                           | –                    |
//! | `TopLepMass`    | `Lepton+Neutrino+LepB` (4) | –                      | –                    |
//! | `NeutrinoMass`  | `Neutrino` (5)        | –                           | `Neutrino` (3)       |
//! | `WPlusMass`     | –                     | `LightQ+LightQBar` (1)      | –                    |
//! | `WMinusMass`    | –                     | `LightP+LightPBar` (2)      | –                    |
//! | `TopMass`       | –                     | `B+LightQ+LightQBar` (3)    | `Lepton+Neutrino+Bottom` (2) |
//! | `TopBarMass`    | –                     | `BBar+LightP+LightPBar` (4) | –                    |
//!
//! Numbers in parentheses are the legacy numeric codes accepted by
//! [`TopConstraint::from_code`].
//!
//! ## Example
//!
//! ```rust
//! use kinfit::hypotheses::{DecayChannel, TopFitConfig, TopKinFitter};
//!
//! let config = TopFitConfig::for_channel(DecayChannel::FullHadronic);
//! let fitter = TopKinFitter::new(DecayChannel::FullHadronic, &config).unwrap();
//! assert_eq!(fitter.n_objects(), 6);
//! ```

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{GeV, TOP_MASS, W_MASS},
    constraints::Constraint,
    fit_particle::{ParticleId, Parametrization},
    four_momentum::FourMomentum,
    kin_fitter::{FitParams, FitResult, FittedParticle, KinFitter},
    kinfit_errors::KinFitError,
};

/// Top-quark pair or single-top decay topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayChannel {
    SemiLeptonic,
    FullHadronic,
    SingleTop,
}

/// Reconstructed object playing a given part in a decay hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    HadB,
    HadP,
    HadQ,
    LepB,
    Lepton,
    Neutrino,
    B,
    BBar,
    LightQ,
    LightQBar,
    LightP,
    LightPBar,
    Bottom,
    Light,
}

/// Detector object class, which selects the parametrization of a [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Jet,
    Lepton,
    Met,
}

impl Role {
    pub fn object_class(&self) -> ObjectClass {
        match self {
            Role::Lepton => ObjectClass::Lepton,
            Role::Neutrino => ObjectClass::Met,
            _ => ObjectClass::Jet,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl DecayChannel {
    pub const ALL: [DecayChannel; 3] = [
        DecayChannel::SemiLeptonic,
        DecayChannel::FullHadronic,
        DecayChannel::SingleTop,
    ];

    /// Objects of the hypothesis, in the order candidates are supplied.
    pub fn roles(&self) -> &'static [Role] {
        match self {
            DecayChannel::SemiLeptonic => &[
                Role::HadB,
                Role::HadP,
                Role::HadQ,
                Role::LepB,
                Role::Lepton,
                Role::Neutrino,
            ],
            DecayChannel::FullHadronic => &[
                Role::B,
                Role::BBar,
                Role::LightQ,
                Role::LightQBar,
                Role::LightP,
                Role::LightPBar,
            ],
            DecayChannel::SingleTop => &[Role::Bottom, Role::Light, Role::Lepton, Role::Neutrino],
        }
    }

    /// Constraints applied when a configuration does not choose its own.
    pub fn default_constraints(&self) -> Vec<TopConstraint> {
        match self {
            DecayChannel::SemiLeptonic => vec![
                TopConstraint::WHadMass,
                TopConstraint::WLepMass,
                TopConstraint::TopHadMass,
                TopConstraint::TopLepMass,
            ],
            DecayChannel::FullHadronic => vec![
                TopConstraint::WPlusMass,
                TopConstraint::WMinusMass,
                TopConstraint::TopMass,
                TopConstraint::TopBarMass,
            ],
            DecayChannel::SingleTop => vec![TopConstraint::WLepMass, TopConstraint::TopMass],
        }
    }
}

impl fmt::Display for DecayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecayChannel::SemiLeptonic => "semi_leptonic",
            DecayChannel::FullHadronic => "full_hadronic",
            DecayChannel::SingleTop => "single_top",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DecayChannel {
    type Err = KinFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "semi_leptonic" | "semileptonic" | "semi_lep" => Ok(DecayChannel::SemiLeptonic),
            "full_hadronic" | "fullhadronic" | "full_had" => Ok(DecayChannel::FullHadronic),
            "single_top" | "singletop" => Ok(DecayChannel::SingleTop),
            _ => Err(KinFitError::UnknownChannel(s.to_string())),
        }
    }
}

/// Mass constraints of the top-quark hypotheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopConstraint {
    WHadMass,
    WLepMass,
    TopHadMass,
    TopLepMass,
    NeutrinoMass,
    WPlusMass,
    WMinusMass,
    TopMass,
    TopBarMass,
}

/// Reference mass a [`TopConstraint`] pins its system to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetMass {
    W,
    Top,
    Zero,
}

impl TopConstraint {
    /// Participating roles in `channel`, `None` when the constraint does not belong to it.
    fn definition(&self, channel: DecayChannel) -> Option<(&'static [Role], TargetMass)> {
        use DecayChannel::*;
        use TopConstraint::*;

        fn def(roles: &'static [Role], mass: TargetMass) -> Option<(&'static [Role], TargetMass)> {
            Some((roles, mass))
        }

        match (channel, self) {
            (SemiLeptonic, WHadMass) => def(&[Role::HadP, Role::HadQ], TargetMass::W),
            (SemiLeptonic, WLepMass) => def(&[Role::Lepton, Role::Neutrino], TargetMass::W),
            (SemiLeptonic, TopHadMass) => {
                def(&[Role::HadP, Role::HadQ, Role::HadB], TargetMass::Top)
            }
            (SemiLeptonic, TopLepMass) => {
                def(&[Role::Lepton, Role::Neutrino, Role::LepB], TargetMass::Top)
            }
            (SemiLeptonic, NeutrinoMass) => def(&[Role::Neutrino], TargetMass::Zero),

            (FullHadronic, WPlusMass) => def(&[Role::LightQ, Role::LightQBar], TargetMass::W),
            (FullHadronic, WMinusMass) => {
                def(&[Role::LightP, Role::LightPBar], TargetMass::W)
            }
            (FullHadronic, TopMass) => {
                def(&[Role::B, Role::LightQ, Role::LightQBar], TargetMass::Top)
            }
            (FullHadronic, TopBarMass) => {
                def(&[Role::BBar, Role::LightP, Role::LightPBar], TargetMass::Top)
            }

            (SingleTop, WLepMass) => def(&[Role::Lepton, Role::Neutrino], TargetMass::W),
            (SingleTop, TopMass) => {
                def(&[Role::Lepton, Role::Neutrino, Role::Bottom], TargetMass::Top)
            }
            (SingleTop, NeutrinoMass) => def(&[Role::Neutrino], TargetMass::Zero),

            _ => None,
        }
    }

    pub fn is_available(&self, channel: DecayChannel) -> bool {
        self.definition(channel).is_some()
    }

    /// Map a legacy numeric constraint code of `channel` onto a variant.
    ///
    /// Codes
    /// -----------------
    /// * semi-leptonic: `1` W(had), `2` W(lep), `3` top(had), `4` top(lep), `5` neutrino mass
    /// * full-hadronic: `1` W+, `2` W−, `3` top, `4` anti-top
    /// * single top: `1` W(lep), `2` top, `3` neutrino mass
    ///
    /// Return
    /// ----------
    /// * The variant, or [`KinFitError::UnsupportedConstraint`] for a code outside the table.
    pub fn from_code(channel: DecayChannel, code: u32) -> Result<Self, KinFitError> {
        use TopConstraint::*;
        let table: &[TopConstraint] = match channel {
            DecayChannel::SemiLeptonic => &[WHadMass, WLepMass, TopHadMass, TopLepMass, NeutrinoMass],
            DecayChannel::FullHadronic => &[WPlusMass, WMinusMass, TopMass, TopBarMass],
            DecayChannel::SingleTop => &[WLepMass, TopMass, NeutrinoMass],
        };
        code.checked_sub(1)
            .and_then(|i| table.get(i as usize))
            .copied()
            .ok_or_else(|| {
                KinFitError::UnsupportedConstraint(format!("code {code} for the {channel} channel"))
            })
    }

    /// Convert a list of legacy codes, failing on the first unsupported one.
    pub fn from_codes(channel: DecayChannel, codes: &[u32]) -> Result<Vec<Self>, KinFitError> {
        codes
            .iter()
            .map(|&c| TopConstraint::from_code(channel, c))
            .collect()
    }
}

impl fmt::Display for TopConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for TopConstraint {
    type Err = KinFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use TopConstraint::*;
        let key = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match key.as_str() {
            "whadmass" => Ok(WHadMass),
            "wlepmass" => Ok(WLepMass),
            "tophadmass" => Ok(TopHadMass),
            "toplepmass" => Ok(TopLepMass),
            "neutrinomass" => Ok(NeutrinoMass),
            "wplusmass" => Ok(WPlusMass),
            "wminusmass" => Ok(WMinusMass),
            "topmass" => Ok(TopMass),
            "topbarmass" => Ok(TopBarMass),
            _ => Err(KinFitError::UnsupportedConstraint(s.to_string())),
        }
    }
}

/// Channel-independent configuration of a top-quark kinematic fit.
///
/// The [`Default`] implementation is [`TopFitConfig::for_channel`] of the semi-leptonic
/// channel: jets in [`Parametrization::EMomDev`], lepton and neutrino in
/// [`Parametrization::EScaledMomDev`], the four W and top mass constraints.
///
/// See also
/// ------------
/// * [`TopFitConfigBuilder`] – Validated construction.
/// * [`TopKinFitter::new`] – Checks the constraints against a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopFitConfig {
    pub jet_parametrization: Parametrization,
    pub lepton_parametrization: Parametrization,
    pub met_parametrization: Parametrization,
    pub constraints: Vec<TopConstraint>,
    /// W-boson mass used by the W constraints (GeV).
    pub w_mass: GeV,
    /// Top-quark mass used by the top constraints (GeV).
    pub top_mass: GeV,
    pub fit: FitParams,
}

impl TopFitConfig {
    /// Preset for `channel`.
    ///
    /// | Channel | Jets | Lepton, neutrino |
    /// |---|---|---|
    /// | semi-leptonic | `EMomDev` | `EScaledMomDev` |
    /// | full-hadronic | `EtEtaPhi` | (none) |
    /// | single top | `EMomDev` | `EtEtaPhi` |
    ///
    /// All presets use the channel's [`DecayChannel::default_constraints`] and the reference
    /// W and top masses.
    pub fn for_channel(channel: DecayChannel) -> Self {
        let (jet, lepton, met) = match channel {
            DecayChannel::SemiLeptonic => (
                Parametrization::EMomDev,
                Parametrization::EScaledMomDev,
                Parametrization::EScaledMomDev,
            ),
            DecayChannel::FullHadronic => (
                Parametrization::EtEtaPhi,
                Parametrization::EtEtaPhi,
                Parametrization::EtEtaPhi,
            ),
            DecayChannel::SingleTop => (
                Parametrization::EMomDev,
                Parametrization::EtEtaPhi,
                Parametrization::EtEtaPhi,
            ),
        };
        TopFitConfig {
            jet_parametrization: jet,
            lepton_parametrization: lepton,
            met_parametrization: met,
            constraints: channel.default_constraints(),
            w_mass: W_MASS,
            top_mass: TOP_MASS,
            fit: FitParams::default(),
        }
    }

    pub fn builder() -> TopFitConfigBuilder {
        TopFitConfigBuilder::new()
    }

    pub fn parametrization_of(&self, class: ObjectClass) -> Parametrization {
        match class {
            ObjectClass::Jet => self.jet_parametrization,
            ObjectClass::Lepton => self.lepton_parametrization,
            ObjectClass::Met => self.met_parametrization,
        }
    }

    /// Channel-independent checks: fit parameters, positive finite masses, no constraint
    /// listed twice.
    pub fn validate(&self) -> Result<(), KinFitError> {
        self.fit.validate()?;
        for (name, mass) in [("w_mass", self.w_mass), ("top_mass", self.top_mass)] {
            if !(mass.is_finite() && mass > 0.0) {
                return Err(KinFitError::InvalidFitParameter(format!(
                    "{name} must be finite and > 0"
                )));
            }
        }
        if let Some(dup) = self.constraints.iter().duplicates().next() {
            return Err(KinFitError::InvalidFitParameter(format!(
                "constraint {dup} is listed more than once"
            )));
        }
        Ok(())
    }

    fn target(&self, mass: TargetMass) -> GeV {
        match mass {
            TargetMass::W => self.w_mass,
            TargetMass::Top => self.top_mass,
            TargetMass::Zero => 0.0,
        }
    }
}

impl Default for TopFitConfig {
    fn default() -> Self {
        TopFitConfig::for_channel(DecayChannel::SemiLeptonic)
    }
}

impl fmt::Display for TopFitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TopFitConfig(jets={}, lepton={}, met={}, constraints=[{}], mW={}, mTop={}, {})",
            self.jet_parametrization,
            self.lepton_parametrization,
            self.met_parametrization,
            self.constraints.iter().join(", "),
            self.w_mass,
            self.top_mass,
            self.fit
        )
    }
}

/// Builder for [`TopFitConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct TopFitConfigBuilder {
    config: TopFitConfig,
}

impl TopFitConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the preset of `channel`.
    pub fn for_channel(channel: DecayChannel) -> Self {
        Self {
            config: TopFitConfig::for_channel(channel),
        }
    }

    pub fn jet_parametrization(mut self, v: Parametrization) -> Self {
        self.config.jet_parametrization = v;
        self
    }
    pub fn lepton_parametrization(mut self, v: Parametrization) -> Self {
        self.config.lepton_parametrization = v;
        self
    }
    pub fn met_parametrization(mut self, v: Parametrization) -> Self {
        self.config.met_parametrization = v;
        self
    }
    pub fn constraints(mut self, v: Vec<TopConstraint>) -> Self {
        self.config.constraints = v;
        self
    }
    pub fn w_mass(mut self, v: GeV) -> Self {
        self.config.w_mass = v;
        self
    }
    pub fn top_mass(mut self, v: GeV) -> Self {
        self.config.top_mass = v;
        self
    }
    pub fn fit(mut self, v: FitParams) -> Self {
        self.config.fit = v;
        self
    }

    /// Finalize the builder, applying [`TopFitConfig::validate`].
    pub fn build(self) -> Result<TopFitConfig, KinFitError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Measured four-momentum with its covariance in the object's parametrization basis.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub momentum: FourMomentum,
    pub covariance: DMatrix<f64>,
}

impl Measurement {
    pub fn new(momentum: FourMomentum, covariance: DMatrix<f64>) -> Self {
        Measurement {
            momentum,
            covariance,
        }
    }

    /// Diagonal covariance from per-parameter resolutions `σᵢ`.
    pub fn with_resolutions(momentum: FourMomentum, resolutions: &[f64]) -> Self {
        let variances = DVector::from_iterator(resolutions.len(), resolutions.iter().map(|s| s * s));
        Measurement {
            momentum,
            covariance: DMatrix::from_diagonal(&variances),
        }
    }
}

/// A [`KinFitter`] configured for one decay hypothesis.
#[derive(Debug, Clone)]
pub struct TopKinFitter {
    channel: DecayChannel,
    config: TopFitConfig,
    fitter: KinFitter,
    ids: Vec<ParticleId>,
}

impl TopKinFitter {
    /// Build the fitter for `channel`.
    ///
    /// Arguments
    /// -----------------
    /// * `channel`: decay topology, fixes the objects.
    /// * `config`: parametrizations, constraint selection, reference masses, fit parameters.
    ///
    /// Return
    /// ----------
    /// * The configured fitter, or an error when `config` is invalid or selects a
    ///   constraint that does not belong to `channel` ([`KinFitError::ConstraintNotAvailable`]).
    pub fn new(channel: DecayChannel, config: &TopFitConfig) -> Result<Self, KinFitError> {
        config.validate()?;

        let mut fitter = KinFitter::new(config.fit);
        let ids = channel
            .roles()
            .iter()
            .map(|role| {
                fitter.add_particle(
                    role.to_string(),
                    config.parametrization_of(role.object_class()),
                )
            })
            .collect::<Vec<_>>();

        let roles = channel.roles();
        for tc in &config.constraints {
            let (members, mass) =
                tc.definition(channel)
                    .ok_or_else(|| KinFitError::ConstraintNotAvailable {
                        constraint: tc.to_string(),
                        channel: channel.to_string(),
                    })?;
            let handles = members
                .iter()
                .filter_map(|r| roles.iter().position(|x| x == r))
                .map(|i| ids[i])
                .collect::<Vec<_>>();
            fitter.add_constraint(Constraint::invariant_mass(
                tc.to_string(),
                &handles,
                config.target(mass),
            ))?;
        }

        Ok(TopKinFitter {
            channel,
            config: config.clone(),
            fitter,
            ids,
        })
    }

    pub fn channel(&self) -> DecayChannel {
        self.channel
    }

    pub fn config(&self) -> &TopFitConfig {
        &self.config
    }

    pub fn fitter(&self) -> &KinFitter {
        &self.fitter
    }

    pub fn n_objects(&self) -> usize {
        self.ids.len()
    }

    /// Fit one candidate assignment of measured objects to the hypothesis.
    ///
    /// Arguments
    /// -----------------
    /// * `candidate`: one [`Measurement`] per role, in [`DecayChannel::roles`] order.
    ///
    /// Return
    /// ----------
    /// * The [`FitResult`]; an aborted result (status code `-10`) when the candidate has the
    ///   wrong number of objects or a measurement is rejected at initialization.
    pub fn fit_candidate(&mut self, candidate: &[Measurement]) -> FitResult {
        let ndf = self.fitter.ndf();
        if candidate.len() != self.ids.len() {
            let err = KinFitError::WrongCandidateSize {
                expected: self.ids.len(),
                found: candidate.len(),
            };
            debug!("{} candidate aborted: {err}", self.channel);
            return FitResult::aborted(err.to_string(), ndf);
        }

        for (&id, m) in self.ids.iter().zip(candidate) {
            if let Err(err) = self.fitter.initialize(id, &m.momentum, &m.covariance) {
                debug!("{} candidate aborted: {err}", self.channel);
                return FitResult::aborted(err.to_string(), ndf);
            }
        }

        match self.fitter.fit() {
            Ok(result) => result,
            Err(err) => FitResult::aborted(err.to_string(), ndf),
        }
    }

    /// Fitted object playing `role` in `result`.
    pub fn fitted<'a>(&self, result: &'a FitResult, role: Role) -> Option<&'a FittedParticle> {
        let idx = self.channel.roles().iter().position(|r| *r == role)?;
        result.particles.get(idx)
    }
}

#[cfg(test)]
mod hypotheses_tests {
    use super::*;

    #[test]
    fn test_legacy_codes() {
        assert_eq!(
            TopConstraint::from_codes(DecayChannel::SemiLeptonic, &[1, 2, 3, 4, 5]).unwrap(),
            vec![
                TopConstraint::WHadMass,
                TopConstraint::WLepMass,
                TopConstraint::TopHadMass,
                TopConstraint::TopLepMass,
                TopConstraint::NeutrinoMass
            ]
        );
        assert_eq!(
            TopConstraint::from_code(DecayChannel::FullHadronic, 4).unwrap(),
            TopConstraint::TopBarMass
        );
        assert_eq!(
            TopConstraint::from_code(DecayChannel::SingleTop, 2).unwrap(),
            TopConstraint::TopMass
        );
        assert!(TopConstraint::from_code(DecayChannel::FullHadronic, 5).is_err());
        assert!(TopConstraint::from_code(DecayChannel::SingleTop, 0).is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "full-hadronic".parse::<DecayChannel>().unwrap(),
            DecayChannel::FullHadronic
        );
        assert_eq!(
            "top_bar_mass".parse::<TopConstraint>().unwrap(),
            TopConstraint::TopBarMass
        );
        assert_eq!(
            "dilepton".parse::<DecayChannel>(),
            Err(KinFitError::UnknownChannel("dilepton".into()))
        );
        for channel in DecayChannel::ALL {
            assert_eq!(channel.to_string().parse::<DecayChannel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_channel_availability() {
        assert!(TopConstraint::WHadMass.is_available(DecayChannel::SemiLeptonic));
        assert!(!TopConstraint::WHadMass.is_available(DecayChannel::FullHadronic));
        assert!(TopConstraint::TopMass.is_available(DecayChannel::SingleTop));

        let config = TopFitConfig::builder()
            .constraints(vec![TopConstraint::WPlusMass])
            .build()
            .unwrap();
        let err = TopKinFitter::new(DecayChannel::SemiLeptonic, &config).unwrap_err();
        assert_eq!(
            err,
            KinFitError::ConstraintNotAvailable {
                constraint: "WPlusMass".into(),
                channel: "semi_leptonic".into()
            }
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(TopFitConfig::builder().w_mass(-80.4).build().is_err());
        assert!(TopFitConfig::builder()
            .constraints(vec![TopConstraint::WLepMass, TopConstraint::WLepMass])
            .build()
            .is_err());
        assert!(TopFitConfig::builder().top_mass(f64::NAN).build().is_err());
    }

    #[test]
    fn test_presets_build() {
        for channel in DecayChannel::ALL {
            let config = TopFitConfig::for_channel(channel);
            let fitter = TopKinFitter::new(channel, &config).unwrap();
            assert_eq!(fitter.n_objects(), channel.roles().len());
            assert_eq!(fitter.fitter().ndf(), channel.default_constraints().len());
        }

        let single_top = TopFitConfig::for_channel(DecayChannel::SingleTop);
        assert_eq!(single_top.jet_parametrization, Parametrization::EMomDev);
        assert_eq!(single_top.lepton_parametrization, Parametrization::EtEtaPhi);
        assert_eq!(single_top.met_parametrization, Parametrization::EtEtaPhi);
        let fitter = TopKinFitter::new(DecayChannel::SingleTop, &single_top).unwrap();
        let n_params: Vec<usize> = fitter.fitter().particles().iter().map(|p| p.n_params()).collect();
        assert_eq!(n_params, vec![4, 4, 3, 3]);
    }

    #[test]
    fn test_wrong_candidate_size_aborts() {
        let mut fitter =
            TopKinFitter::new(DecayChannel::SingleTop, &TopFitConfig::for_channel(DecayChannel::SingleTop))
                .unwrap();
        let m = Measurement::with_resolutions(
            FourMomentum::from_pt_eta_phi_m(40.0, 0.0, 0.0, 0.0),
            &[5.0, 0.05, 0.05],
        );
        let result = fitter.fit_candidate(&[m.clone(), m]);
        assert_eq!(result.status.code(), -10);
        assert_eq!(result.ndf, 2);
    }

    #[test]
    fn test_with_resolutions() {
        let m = Measurement::with_resolutions(FourMomentum::default(), &[2.0, 0.1, 0.5]);
        assert_eq!(m.covariance.shape(), (3, 3));
        assert_eq!(m.covariance[(0, 0)], 4.0);
        assert_eq!(m.covariance[(2, 2)], 0.25);
        assert_eq!(m.covariance[(0, 1)], 0.0);
    }
}
