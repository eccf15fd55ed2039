//! Level-set predicates such as `phi<0` or `phi<0 or phi=0`.

use crate::mesh_error::MeshError;
use std::fmt;
use std::str::FromStr;

/// Where an entity lies relative to the zero level set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// Every vertex value is below `-tol`.
    Inside,
    /// Every vertex value is above `tol`.
    Outside,
    /// Mixed signs, or some value within `tol` of zero.
    Interface,
}

impl Location {
    /// Classify from vertex values.
    pub fn classify(values: impl IntoIterator<Item = f64>, tol: f64) -> Location {
        let (mut neg, mut pos, mut any) = (true, true, false);
        for v in values {
            any = true;
            neg &= v < -tol;
            pos &= v > tol;
        }
        match (any, neg, pos) {
            (true, true, _) => Location::Inside,
            (true, _, true) => Location::Outside,
            _ => Location::Interface,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Location::Inside => 0b001,
            Location::Interface => 0b010,
            Location::Outside => 0b100,
        }
    }
}

/// A union of [`Location`]s selected by a predicate string.
///
/// Grammar: one or more terms `phi<0`, `phi>0`, `phi=0` (also `==`),
/// `phi<=0`, `phi>=0`, joined by `and`, `&&`, `or`, `||` or `,`. All joins
/// mean the union of the selected classes; whitespace is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Predicate(u8);

impl Predicate {
    pub const INSIDE: Predicate = Predicate(0b001);
    pub const INTERFACE: Predicate = Predicate(0b010);
    pub const OUTSIDE: Predicate = Predicate(0b100);

    pub fn parse(s: &str) -> Result<Self, MeshError> {
        s.parse()
    }

    #[inline]
    pub fn contains(self, loc: Location) -> bool {
        self.0 & loc.bit() != 0
    }

    pub fn union(self, other: Predicate) -> Predicate {
        Predicate(self.0 | other.0)
    }

    /// The side kept when cutting: negative or positive sub-region, the
    /// interface itself, or the whole cell when both sides are selected.
    pub fn cut_target(self) -> CutTarget {
        match (self.contains(Location::Inside), self.contains(Location::Outside)) {
            (true, true) => CutTarget::Whole,
            (true, false) => CutTarget::Negative,
            (false, true) => CutTarget::Positive,
            (false, false) => CutTarget::Interface,
        }
    }
}

/// What a cutter keeps of an intersected cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutTarget {
    Negative,
    Positive,
    Interface,
    Whole,
}

fn parse_term(term: &str) -> Option<Predicate> {
    let rest = term.strip_prefix("phi")?;
    let (op, rhs) = ["<=", ">=", "==", "<", ">", "="]
        .iter()
        .find_map(|op| rest.strip_prefix(op).map(|r| (*op, r)))?;
    if rhs.parse::<f64>().ok()? != 0.0 {
        return None;
    }
    Some(match op {
        "<" => Predicate::INSIDE,
        ">" => Predicate::OUTSIDE,
        "=" | "==" => Predicate::INTERFACE,
        "<=" => Predicate::INSIDE.union(Predicate::INTERFACE),
        _ => Predicate::OUTSIDE.union(Predicate::INTERFACE),
    })
}

impl FromStr for Predicate {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let normalized = compact.replace("&&", ",").replace("||", ",");
        let mut acc = Predicate(0);
        for chunk in normalized.split(',') {
            for term in chunk.split("and").flat_map(|t| t.split("or")) {
                let term = term.trim_matches(|c| c == '(' || c == ')');
                let p = parse_term(term).ok_or_else(|| MeshError::InvalidPredicate(s.to_string()))?;
                acc = acc.union(p);
            }
        }
        if acc.0 == 0 {
            return Err(MeshError::InvalidPredicate(s.to_string()));
        }
        Ok(acc)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::new();
        if self.contains(Location::Inside) {
            terms.push("phi<0");
        }
        if self.contains(Location::Interface) {
            terms.push("phi=0");
        }
        if self.contains(Location::Outside) {
            terms.push("phi>0");
        }
        write!(f, "{}", terms.join(" or "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_terms() {
        assert_eq!(Predicate::parse("phi<0").unwrap(), Predicate::INSIDE);
        assert_eq!(Predicate::parse(" phi = 0 ").unwrap(), Predicate::INTERFACE);
        assert_eq!(Predicate::parse("phi>0.0").unwrap(), Predicate::OUTSIDE);
        let le = Predicate::parse("phi<=0").unwrap();
        assert!(le.contains(Location::Inside) && le.contains(Location::Interface));
        assert!(!le.contains(Location::Outside));
    }

    #[test]
    fn conjunctions_take_the_union() {
        let a = Predicate::parse("phi<0 and phi=0").unwrap();
        let b = Predicate::parse("phi<0 || phi=0").unwrap();
        let c = Predicate::parse("(phi<0),(phi=0)").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.cut_target(), CutTarget::Negative);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "psi<0", "phi<1", "phi!0", "phi<0 and"] {
            assert!(
                matches!(Predicate::parse(bad), Err(MeshError::InvalidPredicate(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn classification_uses_tolerance() {
        assert_eq!(Location::classify([-1.0, -2.0], 1e-12), Location::Inside);
        assert_eq!(Location::classify([1.0, 2.0], 1e-12), Location::Outside);
        assert_eq!(Location::classify([-1.0, 1.0], 1e-12), Location::Interface);
        assert_eq!(Location::classify([-1.0, -1e-13], 1e-12), Location::Interface);
        // exactly at the tolerance counts as on the interface
        assert_eq!(Location::classify([1.0, 1e-12], 1e-12), Location::Interface);
    }

    #[test]
    fn display_roundtrips() {
        let p = Predicate::parse("phi>=0").unwrap();
        assert_eq!(Predicate::parse(&p.to_string()).unwrap(), p);
    }
}
