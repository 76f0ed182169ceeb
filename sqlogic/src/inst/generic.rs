//! Generic sort resolution.
//!
//! Matching a schema variable whose sort is (or mentions) a generic sort does
//! not pick a concrete sort right away. It records a [`GenericSortCondition`]
//! instead:
//! - `Identity(G, S)`: `G` must be instantiated with exactly `S` (strict
//!   schema variables, variable schema variables, forcing conditions);
//! - `Supersort(G, S)`: `G` must be instantiated with a supersort of `S`.
//!
//! [`GenericSortInstantiations::resolve`] turns a set of conditions into one
//! concrete sort per generic sort. Among the admissible candidates the least
//! one (w.r.t. `extends_trans`) is chosen; no admissible candidate is an
//! [`Error::UnresolvableGenericSort`], several incomparable least candidates
//! an [`Error::AmbiguousGenericSort`].
use im::OrdMap;
use log::trace;
use smallvec::SmallVec;

use crate::{
    sort::{Sort, SortRegistry, Variance},
    utils::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericSortCondition {
    Identity { generic: Sort, sort: Sort },
    Supersort { generic: Sort, sort: Sort },
}

impl GenericSortCondition {
    pub fn generic(&self) -> &Sort {
        match self {
            GenericSortCondition::Identity { generic, .. }
            | GenericSortCondition::Supersort { generic, .. } => generic,
        }
    }

    pub fn sort(&self) -> &Sort {
        match self {
            GenericSortCondition::Identity { sort, .. }
            | GenericSortCondition::Supersort { sort, .. } => sort,
        }
    }

    /// Conditions under which a term of sort `found` fits the declared sort
    /// `pattern`, or `None` if it never does.
    ///
    /// `strict` asks for sort identity instead of the subsort relation.
    pub fn collect(pattern: &Sort, found: &Sort, strict: bool) -> Option<SmallVec<GenericSortCondition, 2>> {
        let mut out = SmallVec::new();
        collect_into(pattern, found, strict, &mut out).then_some(out)
    }
}

fn collect_into(
    pattern: &Sort,
    found: &Sort,
    strict: bool,
    out: &mut SmallVec<GenericSortCondition, 2>,
) -> bool {
    if !pattern.contains_generic() {
        return if strict {
            pattern == found
        } else {
            found.extends_trans(pattern)
        };
    }
    if pattern.is_generic() {
        out.push(if strict {
            GenericSortCondition::Identity {
                generic: pattern.clone(),
                sort: found.clone(),
            }
        } else {
            GenericSortCondition::Supersort {
                generic: pattern.clone(),
                sort: found.clone(),
            }
        });
        return true;
    }

    let Some((decl, pattern_args)) = pattern.as_instance() else {
        return false;
    };
    // Walk up the hierarchy of `found` to an instance of the same declaration.
    let mut stack: Vec<&Sort> = vec![found];
    while let Some(current) = stack.pop() {
        if let Some((d, args)) = current.as_instance() {
            if d.name == decl.name {
                return decl.params.iter().zip(pattern_args.iter().zip(args)).all(
                    |((_, variance), (p, a))| {
                        let strict_arg = strict || !matches!(variance, Variance::Covariant);
                        collect_into(p, a, strict_arg, out)
                    },
                );
            }
        }
        if strict {
            break;
        }
        stack.extend(current.extends().iter());
    }
    false
}

/// Concrete sorts chosen for the generic sorts of one rule application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericSortInstantiations {
    map: OrdMap<Sort, Sort>,
}

impl GenericSortInstantiations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, generic: &Sort) -> Option<&Sort> {
        self.map.get(generic)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sort, &Sort)> {
        self.map.iter()
    }

    /// Resolves every generic sort mentioned in `conditions`.
    pub fn resolve<'c>(
        conditions: impl IntoIterator<Item = &'c GenericSortCondition>,
        registry: &SortRegistry,
    ) -> Result<Self> {
        let mut grouped: OrdMap<Sort, Vec<&GenericSortCondition>> = OrdMap::new();
        for c in conditions {
            grouped.entry(c.generic().clone()).or_insert_with(Vec::new).push(c);
        }
        let mut map = OrdMap::new();
        if grouped.is_empty() {
            return Ok(Self { map });
        }

        let universe = registry.instantiable_sorts();
        for (generic, conds) in grouped.iter() {
            let chosen = resolve_one(generic, conds, &universe)?;
            trace!("Generic sort {} resolved to {}.", generic, chosen);
            map.insert(generic.clone(), chosen);
        }
        Ok(Self { map })
    }

    /// Checks that `conditions` admit at least one instantiation, without
    /// rejecting ambiguity (it may be resolved by later conditions).
    pub fn satisfiable<'c>(
        conditions: impl IntoIterator<Item = &'c GenericSortCondition>,
        registry: &SortRegistry,
    ) -> bool {
        match Self::resolve(conditions, registry) {
            Ok(_) => true,
            Err(e) => e.is_ambiguous_generic_sort(),
        }
    }

    /// `sort` with every resolved generic sort replaced.
    pub fn realize(&self, sort: &Sort, registry: &SortRegistry) -> Result<Sort> {
        if !sort.contains_generic() {
            return Ok(sort.clone());
        }
        let realized = sort.substitute(&|g| self.map.get(g).cloned(), registry)?;
        if realized.contains_generic() {
            return Err(Error::UnresolvableGenericSort {
                sort: sort.name().clone(),
            });
        }
        Ok(realized)
    }
}

fn admissible(generic: &Sort, candidate: &Sort, conds: &[&GenericSortCondition]) -> bool {
    let bounds_ok = generic
        .extends()
        .iter()
        .filter(|b| !b.contains_generic())
        .all(|b| candidate.extends_trans(b));
    let one_of_ok = generic.one_of().is_empty() || generic.one_of().contains(candidate);
    let conds_ok = conds.iter().all(|c| match c {
        GenericSortCondition::Identity { sort, .. } => sort == candidate,
        GenericSortCondition::Supersort { sort, .. } => sort.extends_trans(candidate),
    });
    bounds_ok && one_of_ok && conds_ok
}

fn resolve_one(generic: &Sort, conds: &[&GenericSortCondition], universe: &[Sort]) -> Result<Sort> {
    let mut candidates: Vec<Sort> = universe
        .iter()
        .chain(conds.iter().map(|c| c.sort()))
        .filter(|s| admissible(generic, s, conds))
        .cloned()
        .collect();
    candidates.sort();
    candidates.dedup();

    let minimal: Vec<Sort> = candidates
        .iter()
        .filter(|s| {
            !candidates
                .iter()
                .any(|t| t != *s && t.extends_trans(s))
        })
        .cloned()
        .collect();

    match minimal.len() {
        0 => Err(Error::UnresolvableGenericSort {
            sort: generic.name().clone(),
        }),
        1 => Ok(minimal[0].clone()),
        _ => Err(Error::AmbiguousGenericSort {
            sort: generic.name().clone(),
            candidates: minimal.iter().map(|s| s.name().clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDeclaration;

    fn registry() -> SortRegistry {
        let reg = SortRegistry::new();
        reg.declare(SortDeclaration::new("num")).unwrap();
        reg.declare(SortDeclaration::new("int").extending(["num"])).unwrap();
        reg.declare(SortDeclaration::new("nat").extending(["int"])).unwrap();
        reg.declare(SortDeclaration::new("bool")).unwrap();
        reg
    }

    #[test]
    fn supersort_condition_picks_least_candidate() {
        let reg = registry();
        let g = Sort::new_generic("G", &[], &[]);
        let conds = [GenericSortCondition::Supersort {
            generic: g.clone(),
            sort: reg.get("int").unwrap(),
        }];
        let inst = GenericSortInstantiations::resolve(&conds, &reg).unwrap();
        assert_eq!(inst.get(&g).unwrap().name().as_str(), "int");
    }

    #[test]
    fn two_supersort_conditions_join() {
        let reg = registry();
        let g = Sort::new_generic("G", &[], &[]);
        let conds = [
            GenericSortCondition::Supersort {
                generic: g.clone(),
                sort: reg.get("nat").unwrap(),
            },
            GenericSortCondition::Supersort {
                generic: g.clone(),
                sort: reg.get("int").unwrap(),
            },
        ];
        let inst = GenericSortInstantiations::resolve(&conds, &reg).unwrap();
        assert_eq!(inst.get(&g).unwrap().name().as_str(), "int");
    }

    #[test]
    fn conflicting_identities_are_unresolvable() {
        let reg = registry();
        let g = Sort::new_generic("G", &[], &[]);
        let conds = [
            GenericSortCondition::Identity {
                generic: g.clone(),
                sort: reg.get("nat").unwrap(),
            },
            GenericSortCondition::Identity {
                generic: g,
                sort: reg.get("bool").unwrap(),
            },
        ];
        let err = GenericSortInstantiations::resolve(&conds, &reg).unwrap_err();
        assert!(err.is_unresolvable_generic_sort());
    }

    #[test]
    fn one_of_restricts_candidates() {
        let reg = registry();
        let num = reg.get("num").unwrap();
        let boolean = reg.get("bool").unwrap();
        let g = Sort::new_generic("G", &[], &[num, boolean]);
        let conds = [GenericSortCondition::Supersort {
            generic: g.clone(),
            sort: Sort::any(),
        }];
        // `any` is not in `one_of`, no candidate is a supersort of `any`.
        assert!(
            GenericSortInstantiations::resolve(&conds, &reg)
                .unwrap_err()
                .is_unresolvable_generic_sort()
        );

        let h = Sort::new_generic("H", &[], &[reg.get("num").unwrap(), reg.get("bool").unwrap()]);
        let inst = GenericSortInstantiations::resolve(
            &[GenericSortCondition::Supersort {
                generic: h.clone(),
                sort: reg.get("nat").unwrap(),
            }],
            &reg,
        );
        assert_eq!(inst.unwrap().get(&h).unwrap().name().as_str(), "num");
    }

    #[test]
    fn incomparable_least_candidates_are_ambiguous() {
        let reg = registry();
        reg.declare(SortDeclaration::new("both").extending(["num", "bool"]))
            .unwrap();
        let g = Sort::new_generic("G", &[], &[reg.get("num").unwrap(), reg.get("bool").unwrap()]);
        let conds = [GenericSortCondition::Supersort {
            generic: g,
            sort: reg.get("both").unwrap(),
        }];
        match GenericSortInstantiations::resolve(&conds, &reg).unwrap_err() {
            Error::AmbiguousGenericSort { candidates, .. } => {
                assert_eq!(candidates, vec!["bool".into(), "num".into()] as Vec<crate::name::Name>);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(GenericSortInstantiations::satisfiable(&conds, &reg));
    }

    #[test]
    fn collects_conditions_through_instances() {
        let reg = registry();
        reg.declare_parametric("Seq", &[("E", Variance::Covariant)], &[], None)
            .unwrap();
        let g = Sort::new_generic("G", &[], &[]);
        let pattern = reg
            .instantiate_parametric(&"Seq".into(), [g.clone()])
            .unwrap();
        let found = reg
            .instantiate_parametric(&"Seq".into(), [reg.get("int").unwrap()])
            .unwrap();
        let conds = GenericSortCondition::collect(&pattern, &found, false).unwrap();
        assert_eq!(conds.len(), 1);
        assert!(matches!(&conds[0], GenericSortCondition::Supersort { sort, .. } if sort.name().as_str() == "int"));
        assert!(GenericSortCondition::collect(&pattern, &reg.get("int").unwrap(), false).is_none());
    }
}
