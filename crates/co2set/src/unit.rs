use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Factor relating elemental carbon tonnage to CO2 tonnage.
pub(crate) const CARBON_TO_CO2: f64 = 3.664;

/// The unit of a metric column, as declared in the source schema.
///
/// Columns tagged with a carbon-mass unit are converted to the
/// corresponding CO2-mass unit at load time; every other unit passes
/// through the pipeline untouched.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Hash,
    Clone,
    Copy,
    PartialOrd,
    Ord,
)]
#[serde(try_from = "String", into = "String")]
pub(crate) enum Unit {
    TonnesCarbon,
    MillionTonnesCarbon,
    TonnesCo2,
    MillionTonnesCo2,
    TonnesCo2PerCapita,
    KilogramsCo2PerDollar,
    KilogramsCo2PerKilowattHour,
    TerawattHours,
    KilowattHours,
    Persons,
    InternationalDollars,
    Percent,
}

impl Unit {
    /// Whether the unit measures tonnes of elemental carbon.
    #[inline]
    pub(crate) fn is_carbon_mass(&self) -> bool {
        matches!(
            self,
            Self::TonnesCarbon | Self::MillionTonnesCarbon
        )
    }

    /// The unit a column carries after carbon-mass conversion.
    /// Non-carbon units are returned unchanged.
    pub(crate) fn converted(self) -> Self {
        match self {
            Self::TonnesCarbon => Self::TonnesCo2,
            Self::MillionTonnesCarbon => Self::MillionTonnesCo2,
            unit => unit,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TonnesCarbon => write!(f, "tonnes carbon"),
            Self::MillionTonnesCarbon => {
                write!(f, "million tonnes carbon")
            }
            Self::TonnesCo2 => write!(f, "tonnes CO2"),
            Self::MillionTonnesCo2 => {
                write!(f, "million tonnes CO2")
            }
            Self::TonnesCo2PerCapita => {
                write!(f, "tonnes CO2 per capita")
            }
            Self::KilogramsCo2PerDollar => {
                write!(f, "kilograms CO2 per $")
            }
            Self::KilogramsCo2PerKilowattHour => {
                write!(f, "kilograms CO2 per kilowatt-hour")
            }
            Self::TerawattHours => write!(f, "terawatt-hours"),
            Self::KilowattHours => write!(f, "kilowatt-hours"),
            Self::Persons => write!(f, "persons"),
            Self::InternationalDollars => {
                write!(f, "international-$")
            }
            Self::Percent => write!(f, "%"),
        }
    }
}

impl FromStr for Unit {
    type Err = Co2setError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tonnes carbon" => Ok(Self::TonnesCarbon),
            "million tonnes carbon" => {
                Ok(Self::MillionTonnesCarbon)
            }
            "tonnes CO2" | "tonnes co2" => Ok(Self::TonnesCo2),
            "million tonnes CO2" | "million tonnes co2" => {
                Ok(Self::MillionTonnesCo2)
            }
            "tonnes CO2 per capita" | "tonnes co2 per capita" => {
                Ok(Self::TonnesCo2PerCapita)
            }
            "kilograms CO2 per $" => {
                Ok(Self::KilogramsCo2PerDollar)
            }
            "kilograms CO2 per kilowatt-hour" => {
                Ok(Self::KilogramsCo2PerKilowattHour)
            }
            "terawatt-hours" => Ok(Self::TerawattHours),
            "kilowatt-hours" => Ok(Self::KilowattHours),
            "persons" => Ok(Self::Persons),
            "international-$" => Ok(Self::InternationalDollars),
            "%" => Ok(Self::Percent),
            _ => bail!("invalid unit '{s}'"),
        }
    }
}

impl TryFrom<String> for Unit {
    type Error = Co2setError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.to_string()
    }
}
