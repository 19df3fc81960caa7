use crate::geometry::Vector;
use crate::particle::Particle;

/// Newtonian gravitational constant in m^3 kg^-1 s^-2.
pub const G: f64 = 6.674_30e-11;

/// An inter-particle force law, expressed as the acceleration a source
/// particle induces on a subject particle.
///
/// Working in accelerations rather than forces saves a division by the
/// subject mass in the hot path; [`Field::force`] multiplies it back in.
pub trait Field: Send + Sync {
    /// Add to `acceleration` the acceleration of `subject` due to `source`.
    ///
    /// A massless source, or a source at zero separation, must leave the
    /// accumulator unchanged.
    fn add_acceleration(&self, source: &Particle, subject: &Particle, acceleration: &mut Vector);

    /// The acceleration of `subject` due to `source`.
    fn acceleration(&self, source: &Particle, subject: &Particle) -> Vector {
        let mut acceleration = Vector::zeros();
        self.add_acceleration(source, subject, &mut acceleration);
        acceleration
    }

    /// The force on `subject` due to `source`.
    fn force(&self, source: &Particle, subject: &Particle) -> Vector {
        subject.mass * self.acceleration(source, subject)
    }
}

/// Newton's law of universal gravitation.
#[derive(Clone, Copy, Debug)]
pub struct NewtonianField {
    grav: f64,
}

impl NewtonianField {
    pub fn new(grav: f64) -> Self {
        Self { grav }
    }

    pub fn grav(&self) -> f64 {
        self.grav
    }
}

impl Default for NewtonianField {
    fn default() -> Self {
        Self { grav: G }
    }
}

impl Field for NewtonianField {
    fn add_acceleration(&self, source: &Particle, subject: &Particle, acceleration: &mut Vector) {
        if source.mass == 0.0 {
            return;
        }

        let r = source.displacement - subject.displacement;
        let distance_squared = r.norm_squared();

        if distance_squared == 0.0 {
            return;
        }

        *acceleration += self.grav * source.mass * r / distance_squared.sqrt().powi(3);
    }
}

/// Gravitation softened by the Plummer model, with the source particle's
/// radii as the softening length.
#[derive(Clone, Copy, Debug)]
pub struct PlummerField {
    grav: f64,
}

impl PlummerField {
    pub fn new(grav: f64) -> Self {
        Self { grav }
    }

    pub fn grav(&self) -> f64 {
        self.grav
    }
}

impl Default for PlummerField {
    fn default() -> Self {
        Self { grav: G }
    }
}

impl Field for PlummerField {
    fn add_acceleration(&self, source: &Particle, subject: &Particle, acceleration: &mut Vector) {
        if source.mass == 0.0 {
            return;
        }

        let r = source.displacement - subject.displacement;
        let softened = r.norm_squared() + source.radii.norm_squared();

        if softened == 0.0 {
            return;
        }

        *acceleration += self.grav * source.mass * r / softened.powf(1.5);
    }
}
