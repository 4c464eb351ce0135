use serde::{Deserialize, Serialize};

/// One of the four sides of the rectangular domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Bottom,
    Top,
    Left,
    Right,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [
        Boundary::Bottom,
        Boundary::Top,
        Boundary::Left,
        Boundary::Right,
    ];
}

/// Which sides of the domain carry a prescribed pressure (Dirichlet). Every
/// other outer edge carries a prescribed flux (Neumann).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryPolicy {
    dirichlet: Vec<Boundary>,
}

impl BoundaryPolicy {
    pub fn dirichlet_on(sides: &[Boundary]) -> Self {
        let mut dirichlet = Vec::with_capacity(sides.len());
        for &side in sides {
            if !dirichlet.contains(&side) {
                dirichlet.push(side);
            }
        }
        Self { dirichlet }
    }

    /// Pure flux problem, no side has a prescribed pressure.
    pub fn all_neumann() -> Self {
        Self::dirichlet_on(&[])
    }

    pub fn is_dirichlet(&self, side: Boundary) -> bool {
        self.dirichlet.contains(&side)
    }

    pub fn dirichlet_sides(&self) -> &[Boundary] {
        &self.dirichlet
    }
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        Self::dirichlet_on(&[Boundary::Top])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_top_only() {
        let policy = BoundaryPolicy::default();
        assert!(policy.is_dirichlet(Boundary::Top));
        for side in [Boundary::Bottom, Boundary::Left, Boundary::Right] {
            assert!(!policy.is_dirichlet(side));
        }
    }

    #[test]
    fn duplicate_sides_collapse() {
        let policy = BoundaryPolicy::dirichlet_on(&[Boundary::Left, Boundary::Left]);
        assert_eq!(policy.dirichlet_sides(), &[Boundary::Left]);
    }

    #[test]
    fn parses_from_json() {
        let policy: BoundaryPolicy =
            serde_json::from_str(r#"{ "dirichlet": ["left", "right"] }"#).unwrap();
        assert!(policy.is_dirichlet(Boundary::Left));
        assert!(policy.is_dirichlet(Boundary::Right));
        assert!(!policy.is_dirichlet(Boundary::Top));
    }
}
