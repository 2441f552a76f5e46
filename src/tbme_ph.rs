//! Particle-hole coupled two-body matrix elements and the Pandya
//! transformation to and from the particle-particle coupling.
//!
//! A particle-hole element `V̄(ab̄, cd̄; J')` couples the particle `a` and
//! the hole `b` to `J'`.  Channels are labeled by `(J', parity, Tz')` with
//! `Tz' = tz_a − tz_b`, and every ordered orbit pair that satisfies the
//! triangle rule is a ket; there is no antisymmetry to exploit.
//!
//! ```text
//! V̄(ab̄, cd̄; J') = −Σ[J] (2 J + 1) {ja jb J'; jc jd J} Ṽ(ad, cb; J)
//! Ṽ(ab, cd; J)   = −Σ[J'] (2 J' + 1) {ja jb J; jc jd J'} V̄(ad̄, cb̄; J')
//! ```
//!
//! where `Ṽ` are the physical (`_norm`) particle-particle elements.
use fnv::FnvHashMap;
use super::ang_mom::{jweight, Wigner6jCtx};
use super::half::Half;
use super::matrix::Matrix;
use super::model_space::{Jpt, ModelSpace};
use super::tbme::{Error, Symmetry, TwoBodyMe};
use super::utils;

#[derive(Clone, Debug)]
pub struct PhChannel {
    pub jpt: Jpt,
    pairs: Vec<(usize, usize)>,
    local: FnvHashMap<(usize, usize), usize>,
}

impl PhChannel {
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn local_index(&self, a: usize, b: usize) -> Option<usize> {
        self.local.get(&(a, b)).cloned()
    }
}

/// Scalar operator in the particle-hole coupling.
#[derive(Clone, Debug)]
pub struct TwoBodyMePh<'a> {
    model_space: &'a ModelSpace,
    channels: Vec<PhChannel>,
    chan_chart: FnvHashMap<Jpt, usize>,
    mat_el: Vec<Matrix<f64>>,
    symmetry: Symmetry,
}

impl<'a> TwoBodyMePh<'a> {
    pub fn new(model_space: &'a ModelSpace) -> Self {
        let orbits = model_space.orbits();
        let mut by_jpt: FnvHashMap<Jpt, Vec<(usize, usize)>> =
            utils::default_hash_map();
        for (a, oa) in orbits.iter().enumerate() {
            for (b, ob) in orbits.iter().enumerate() {
                for j12 in oa.j.tri_range(ob.j) {
                    by_jpt.entry(Jpt {
                        j: j12.twice() / 2,
                        p: oa.parity() + ob.parity(),
                        tz: (oa.tz - ob.tz).twice() / 2,
                    }).or_insert_with(Vec::new).push((a, b));
                }
            }
        }
        let mut jpts: Vec<_> = by_jpt.keys().cloned().collect();
        jpts.sort();
        let mut channels = Vec::with_capacity(jpts.len());
        let mut chan_chart = utils::default_hash_map();
        for jpt in jpts {
            let pairs = by_jpt.remove(&jpt).unwrap_or_default();
            let local = pairs.iter().enumerate()
                .map(|(i, &pair)| (pair, i))
                .collect();
            chan_chart.insert(jpt, channels.len());
            channels.push(PhChannel { jpt, pairs, local });
        }
        let mat_el = channels.iter()
            .map(|c| Matrix::zeros(c.pairs.len(), c.pairs.len()))
            .collect();
        Self {
            model_space,
            channels,
            chan_chart,
            mat_el,
            symmetry: Symmetry::Hermitian,
        }
    }

    #[inline]
    pub fn model_space(&self) -> &'a ModelSpace {
        self.model_space
    }

    #[inline]
    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    #[inline]
    pub fn channels(&self) -> &[PhChannel] {
        &self.channels
    }

    pub fn get_matrix(&self, ch: usize) -> Option<&Matrix<f64>> {
        self.mat_el.get(ch)
    }

    fn locate(&self, j: i32, a: usize, b: usize) -> Option<(usize, usize)> {
        let oa = self.model_space.orbit(a)?;
        let ob = self.model_space.orbit(b)?;
        let ch = self.chan_chart.get(&Jpt {
            j,
            p: oa.parity() + ob.parity(),
            tz: (oa.tz - ob.tz).twice() / 2,
        }).cloned()?;
        Some((ch, self.channels[ch].local_index(a, b)?))
    }

    /// `V̄(ab̄, cd̄; J')`, zero if either pair cannot couple to `J'` or the
    /// two pairs fall into different channels.
    pub fn get(&self, j: i32, a: usize, b: usize, c: usize, d: usize) -> f64 {
        match (self.locate(j, a, b), self.locate(j, c, d)) {
            (Some((ch1, i)), Some((ch2, k))) if ch1 == ch2 => {
                self.mat_el[ch1][(i, k)]
            }
            _ => 0.0,
        }
    }

    pub fn set(&mut self, j: i32, a: usize, b: usize, c: usize, d: usize,
               value: f64) -> Result<(), Error> {
        let (ch, i, k) = self.require(j, a, b, c, d)?;
        self.mat_el[ch][(i, k)] = value;
        Ok(())
    }

    pub fn add(&mut self, j: i32, a: usize, b: usize, c: usize, d: usize,
               value: f64) -> Result<(), Error> {
        let (ch, i, k) = self.require(j, a, b, c, d)?;
        self.mat_el[ch][(i, k)] += value;
        Ok(())
    }

    fn require(&self, j: i32, a: usize, b: usize, c: usize, d: usize)
               -> Result<(usize, usize, usize), Error> {
        match (self.locate(j, a, b), self.locate(j, c, d)) {
            (Some((ch1, i)), Some((ch2, k))) if ch1 == ch2 => Ok((ch1, i, k)),
            _ => Err(Error::Selection(format!(
                "({}, {}; {}, {}) is not a particle-hole element with J = {}",
                a, b, c, d, j))),
        }
    }

    /// Pandya transformation of a scalar particle-particle operator.
    pub fn from_pp(pp: &TwoBodyMe<'a>) -> Result<Self, Error> {
        if !pp.is_scalar() {
            return Err(Error::Selection(
                "particle-hole transformation requires a scalar operator"
                    .into()));
        }
        let ms = pp.model_space();
        let mut ph = Self::new(ms);
        ph.symmetry = pp.symmetry();
        let orbits = ms.orbits();
        let mut w6j = Wigner6jCtx::default();
        for (chan, m) in ph.channels.iter().zip(&mut ph.mat_el) {
            let jph = Half::from(chan.jpt.j);
            for (i, &(a, b)) in chan.pairs.iter().enumerate() {
                for (k, &(c, d)) in chan.pairs.iter().enumerate() {
                    let (ja, jb) = (orbits[a].j, orbits[b].j);
                    let (jc, jd) = (orbits[c].j, orbits[d].j);
                    let mut sum = 0.0;
                    for jpp in ja.tri_range(jd) {
                        let w = w6j.w6j(ja, jb, jph, jc, jd, jpp);
                        if w == 0.0 {
                            continue;
                        }
                        let j = jpp.twice() / 2;
                        sum -= jweight(jpp, 2) * w
                            * pp.get_tbme_j_norm(j, j, a, d, c, b)?;
                    }
                    m[(i, k)] = sum;
                }
            }
        }
        Ok(ph)
    }
}

impl<'a> TwoBodyMe<'a> {
    /// Scalar particle-particle operator from its particle-hole coupled
    /// form (inverse Pandya transformation).
    pub fn from_particle_hole(ph: &TwoBodyMePh<'a>) -> Result<Self, Error> {
        let ms = ph.model_space();
        let mut pp = TwoBodyMe::new(ms);
        // every cell is computed; nothing should be mirrored while filling
        pp.set_non_hermitian();
        let orbits = ms.orbits();
        let mut w6j = Wigner6jCtx::default();
        for (ch, chan) in ms.channels().iter().enumerate() {
            let jpp = Half::from(chan.j());
            for bra in chan.kets() {
                for ket in chan.kets() {
                    let (a, b, c, d) = (bra.p, bra.q, ket.p, ket.q);
                    let (ja, jb) = (orbits[a].j, orbits[b].j);
                    let (jc, jd) = (orbits[c].j, orbits[d].j);
                    let mut sum = 0.0;
                    for jph in ja.tri_range(jd) {
                        let w = w6j.w6j(ja, jb, jpp, jc, jd, jph);
                        if w == 0.0 {
                            continue;
                        }
                        sum -= jweight(jph, 2) * w
                            * ph.get(jph.twice() / 2, a, d, c, b);
                    }
                    pp.set_tbme_norm(ch, ch, a, b, c, d, sum)?;
                }
            }
        }
        pp.set_symmetry(ph.symmetry());
        Ok(pp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::basis::Orbit;

    #[test]
    fn test_channels() {
        let ms = ModelSpace::new(vec![
            Orbit::proton(0, 0, Half(1)),
            Orbit::neutron(0, 0, Half(1)),
        ]).unwrap();
        let ph = TwoBodyMePh::new(&ms);
        // Tz' ∈ {−1, 0, 1} times J' ∈ {0, 1}
        assert_eq!(ph.channels().len(), 6);
        let total: usize = ph.channels().iter().map(|c| c.pairs().len()).sum();
        assert_eq!(total, 8);
        assert_eq!(ph.get(2, 0, 0, 0, 0), 0.0);
    }

    #[test]
    fn test_set_get() {
        let ms = ModelSpace::with_e_max(0);
        let mut ph = TwoBodyMePh::new(&ms);
        ph.set(1, 0, 1, 0, 1, 0.25).unwrap();
        ph.add(1, 0, 1, 0, 1, 0.25).unwrap();
        assert_eq!(ph.get(1, 0, 1, 0, 1), 0.5);
        // (p p̄) has Tz' = 0, (p n̄) has Tz' = 1
        assert!(ph.set(1, 0, 0, 0, 1, 1.0).is_err());
        assert!(ph.set(2, 0, 1, 0, 1, 1.0).is_err());
    }
}
