//! Surfaces from statistical regressions against removed pollutant load.
use super::{MethodEstimate, SurfaceBand, SurfaceMethod};
use crate::scenario::Scenario;
use crate::technology::{ModelForm, RegressionModel, Technology};
use crate::units::{Area, Flow};
use log::debug;

impl From<ModelForm> for SurfaceMethod {
    fn from(form: ModelForm) -> Self {
        match form {
            ModelForm::Linear => Self::Linear,
            ModelForm::Exponential => Self::Exponential,
            ModelForm::Power => Self::Power,
        }
    }
}

impl RegressionModel {
    /// Predict the surface band for a removed load (kg/day).
    ///
    /// Returns `None` outside the calibrated load range or if the prediction isn't positive.
    pub fn predict(&self, load: f64) -> Option<SurfaceBand> {
        if !self.load_range.contains(&load) {
            return None;
        }

        let (low, mean, high) = match self.form {
            ModelForm::Linear => {
                let mean = self.a + self.b * load;
                (mean - self.interval, mean, mean + self.interval)
            }
            ModelForm::Exponential => {
                let mean = self.a * (self.b * load).exp();
                (mean - self.interval, mean, mean + self.interval)
            }
            ModelForm::Power => {
                // Fitted in log space, so the interval is multiplicative
                let mean = self.a * load.powf(self.b);
                (
                    mean * (-self.interval).exp(),
                    mean,
                    mean * self.interval.exp(),
                )
            }
        };

        (mean.is_finite() && mean > 0.0).then(|| SurfaceBand {
            low: Area(low.max(0.0)),
            mean: Area(mean),
            high: Area(high),
        })
    }
}

/// Whether the technology has any regression models to try
pub fn applies(technology: &Technology, scenario: &Scenario) -> bool {
    !technology.regressions.is_empty() && scenario.has_inlet_concentrations()
}

/// Size a technology from its regressions, controlled by the pollutant needing most surface
pub fn estimate(
    technology: &Technology,
    scenario: &Scenario,
    inflow: Flow,
) -> Option<MethodEstimate> {
    technology
        .regressions
        .iter()
        .filter_map(|(pollutant, model)| {
            let target = scenario.concentrations.get(pollutant)?;
            let outlet = target.outlet?;
            let load = inflow.value() * (target.inlet - outlet) / 1000.0;
            let surface = model.predict(load);
            if surface.is_none() {
                debug!(
                    "Removed {pollutant} load of {load} kg/day is outside the {} model range for {}",
                    model.form, technology.id
                );
            }

            Some(MethodEstimate {
                method: model.form.into(),
                pollutant: Some(*pollutant),
                surface: surface?,
            })
        })
        .max_by(|a, b| a.surface.mean.value().total_cmp(&b.surface.mean.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn model(form: ModelForm, a: f64, b: f64, interval: f64) -> RegressionModel {
        RegressionModel {
            form,
            a,
            b,
            interval,
            load_range: 0.001..=50.0,
        }
    }

    #[rstest]
    #[case(model(ModelForm::Linear, 27.5, 250.0, 75.0), 2.5, 577.5, 652.5, 727.5)]
    #[case(model(ModelForm::Exponential, 169.0, 0.05, 75.5), 15.0, 282.273, 357.773, 433.273)]
    #[case(model(ModelForm::Power, 10270.0, 0.8, 0.3955), 0.008, 145.304, 215.796, 320.484)]
    fn test_predict(
        #[case] model: RegressionModel,
        #[case] load: f64,
        #[case] low: f64,
        #[case] mean: f64,
        #[case] high: f64,
    ) {
        let band = model.predict(load).unwrap();
        assert_approx_eq!(f64, band.low.value(), low, epsilon = 0.01);
        assert_approx_eq!(f64, band.mean.value(), mean, epsilon = 0.01);
        assert_approx_eq!(f64, band.high.value(), high, epsilon = 0.01);
    }

    #[test]
    fn test_predict_out_of_range() {
        let model = model(ModelForm::Linear, 27.5, 250.0, 75.0);
        assert!(model.predict(60.0).is_none());
        assert!(model.predict(0.0).is_none());
    }

    #[test]
    fn test_low_floored_at_zero() {
        let model = model(ModelForm::Linear, 10.0, 1.0, 75.0);
        let band = model.predict(1.0).unwrap();
        assert_eq!(band.low, Area(0.0));
        assert_eq!(band.mean, Area(11.0));
    }

    #[test]
    fn test_negative_prediction_rejected() {
        let model = model(ModelForm::Linear, -100.0, 1.0, 5.0);
        assert!(model.predict(1.0).is_none());
    }
}
