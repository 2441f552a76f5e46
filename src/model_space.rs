//! Catalog of single-particle orbits and two-body channels.
use std::fmt;
use fnv::FnvHashMap;
use super::basis::{HashChart, Ho3dIter, Ket, Orbit};
use super::half::Half;
use super::parity::Parity;
use super::utils;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        DuplicateOrbit(orbit: Orbit) {
            display("orbit {} appears more than once", orbit)
        }
        InvalidLabel(label: String, reason: String) {
            display("invalid orbit label {:?}: {}", label, reason)
        }
    }
}

/// Quantum numbers of a two-body channel: total angular momentum `J`,
/// parity, and pair isospin projection `Tz = tz_a + tz_b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
         Serialize, Deserialize)]
pub struct Jpt {
    pub j: i32,
    pub p: Parity,
    pub tz: i32,
}

impl fmt::Display for Jpt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "J={}{} Tz={}", self.j, self.p, self.tz)
    }
}

/// Kets of a single two-body channel.
#[derive(Clone, Debug)]
pub struct TwoBodyChannel {
    pub jpt: Jpt,
    kets: Vec<Ket>,
    local: FnvHashMap<(usize, usize), usize>,
}

impl TwoBodyChannel {
    #[inline]
    pub fn j(&self) -> i32 {
        self.jpt.j
    }

    #[inline]
    pub fn num_kets(&self) -> usize {
        self.kets.len()
    }

    #[inline]
    pub fn kets(&self) -> &[Ket] {
        &self.kets
    }

    #[inline]
    pub fn ket(&self, i: usize) -> Option<&Ket> {
        self.kets.get(i)
    }

    /// In-channel index of the canonical ket `(p, q)`, `p ≤ q`.
    #[inline]
    pub fn local_index(&self, p: usize, q: usize) -> Option<usize> {
        self.local.get(&(p, q)).cloned()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// Maximum harmonic oscillator shell `2 n + l` (used when `orbits` is
    /// empty).
    pub e_max: i32,
    /// Explicit list of orbit labels such as `0s1/2p`.
    pub orbits: Vec<String>,
}

impl Conf {
    pub fn make_model_space(&self) -> Result<ModelSpace, Error> {
        if self.orbits.is_empty() {
            return Ok(ModelSpace::with_e_max(self.e_max));
        }
        let orbits = self.orbits.iter().map(|s| {
            s.parse::<Orbit>()
                .map_err(|e| Error::InvalidLabel(s.clone(), e.to_string()))
        }).collect::<Result<Vec<_>, _>>()?;
        ModelSpace::new(orbits)
    }
}

/// Orbits, canonical kets, and the two-body channels they fall into.
///
/// Channels are indexed in ascending `(J, parity, Tz)` order and only
/// channels with at least one ket exist.
#[derive(Clone, Debug)]
pub struct ModelSpace {
    orbits: HashChart<Orbit>,
    channels: Vec<TwoBodyChannel>,
    chan_chart: FnvHashMap<Jpt, usize>,
}

impl ModelSpace {
    pub fn new<I: IntoIterator<Item = Orbit>>(orbits: I) -> Result<Self, Error> {
        let mut chart = HashChart::default();
        for orbit in orbits {
            if !chart.insert(orbit).inserted {
                return Err(Error::DuplicateOrbit(orbit));
            }
        }
        Ok(Self::from_chart(chart))
    }

    /// Full harmonic oscillator space up to shell `e_max`, protons first
    /// within each `(n, l, j)`.
    pub fn with_e_max(e_max: i32) -> Self {
        let chart = Ho3dIter::default()
            .take_while(|&(n, l, _)| 2 * n + l <= e_max)
            .flat_map(|(n, l, j)| {
                vec![Orbit::proton(n, l, j), Orbit::neutron(n, l, j)]
            })
            .collect();
        Self::from_chart(chart)
    }

    fn from_chart(orbits: HashChart<Orbit>) -> Self {
        let mut by_jpt: FnvHashMap<Jpt, Vec<Ket>> = utils::default_hash_map();
        for (p, op) in orbits.decoder.iter().enumerate() {
            for (q, oq) in orbits.decoder.iter().enumerate().skip(p) {
                let ket = Ket { p, q, jp: op.j, jq: oq.j };
                let p12 = op.parity() + oq.parity();
                let tz = (op.tz + oq.tz).twice() / 2;
                for j12 in op.j.tri_range(oq.j) {
                    let j = j12.twice() / 2;
                    if p == q && j % 2 != 0 {
                        continue;
                    }
                    by_jpt.entry(Jpt { j, p: p12, tz })
                        .or_insert_with(Vec::new)
                        .push(ket);
                }
            }
        }
        let mut jpts: Vec<_> = by_jpt.keys().cloned().collect();
        jpts.sort();
        let mut channels = Vec::with_capacity(jpts.len());
        let mut chan_chart = utils::default_hash_map();
        for jpt in jpts {
            let kets = by_jpt.remove(&jpt).unwrap_or_default();
            let local = kets.iter().enumerate()
                .map(|(i, k)| ((k.p, k.q), i))
                .collect();
            chan_chart.insert(jpt, channels.len());
            channels.push(TwoBodyChannel { jpt, kets, local });
        }
        Self { orbits, channels, chan_chart }
    }

    #[inline]
    pub fn num_orbits(&self) -> usize {
        self.orbits.len()
    }

    #[inline]
    pub fn orbits(&self) -> &[Orbit] {
        &self.orbits.decoder
    }

    #[inline]
    pub fn orbit(&self, a: usize) -> Option<&Orbit> {
        self.orbits.decode(a)
    }

    #[inline]
    pub fn find_orbit(&self, orbit: &Orbit) -> Option<usize> {
        self.orbits.encode(orbit)
    }

    /// Index of the orbit with the same `(n, l, j)` as `a` but isospin
    /// projection `tz`.
    pub fn isospin_partner(&self, a: usize, tz: Half<i32>) -> Option<usize> {
        self.find_orbit(&self.orbit(a)?.with_tz(tz))
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channels(&self) -> &[TwoBodyChannel] {
        &self.channels
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> Option<&TwoBodyChannel> {
        self.channels.get(ch)
    }

    #[inline]
    pub fn channel_index(&self, jpt: Jpt) -> Option<usize> {
        self.chan_chart.get(&jpt).cloned()
    }

    /// Channel quantum numbers of the pair `(a, b)` coupled to `j`.
    /// Returns `None` if either orbit is unknown.
    pub fn pair_jpt(&self, a: usize, b: usize, j: i32) -> Option<Jpt> {
        let oa = self.orbit(a)?;
        let ob = self.orbit(b)?;
        Some(Jpt {
            j,
            p: oa.parity() + ob.parity(),
            tz: (oa.tz + ob.tz).twice() / 2,
        })
    }

    /// Largest two-body `J` present.
    pub fn j_max(&self) -> i32 {
        self.channels.last().map(|c| c.j()).unwrap_or(0)
    }
}
