use sqlogic::{
    Error,
    inst::{GenericSortCondition, GenericSortInstantiations},
    sort::{Sort, SortDeclaration, SortRegistry, Variance},
};

fn hierarchy() -> SortRegistry {
    let reg = SortRegistry::new();
    reg.declare(SortDeclaration::new("Object").set_abstract(true)).unwrap();
    reg.declare(SortDeclaration::new("Shape").extending(["Object"])).unwrap();
    reg.declare(SortDeclaration::new("Circle").extending(["Shape"])).unwrap();
    reg.declare(SortDeclaration::new("Square").extending(["Shape"])).unwrap();
    reg.declare(SortDeclaration::new("Label").extending(["Object"]).documented("Text"))
        .unwrap();
    reg.declare_parametric("List", &[("E", Variance::Covariant)], &[], None)
        .unwrap();
    reg.declare_parametric("Ref", &[("E", Variance::Invariant)], &["Object"], None)
        .unwrap();
    reg
}

#[test]
fn extension_is_reflexive_and_transitive() {
    let reg = hierarchy();
    let object = reg.get("Object").unwrap();
    let shape = reg.get("Shape").unwrap();
    let circle = reg.get("Circle").unwrap();
    let label = reg.get("Label").unwrap();

    assert!(circle.extends_trans(&circle));
    assert!(circle.extends_trans(&shape));
    assert!(circle.extends_trans(&object));
    assert!(circle.extends_trans(&Sort::any()));
    assert!(!shape.extends_trans(&circle));
    assert!(!label.extends_trans(&shape));
    assert!(!Sort::formula().extends_trans(&Sort::any()));
    assert!(!Sort::update().extends_trans(&Sort::any()));
    assert!(object.is_abstract());
    assert_eq!(label.documentation(), Some("Text"));
}

#[test]
fn duplicate_and_unknown_sorts_are_rejected() {
    let reg = hierarchy();
    assert!(matches!(
        reg.declare(SortDeclaration::new("Shape")),
        Err(Error::DuplicateSort { .. })
    ));
    assert!(matches!(
        reg.declare(SortDeclaration::new("Oval").extending(["Ellipse"])),
        Err(Error::UnknownSort { .. })
    ));
    assert!(matches!(
        reg.declare(SortDeclaration::new("List")),
        Err(Error::DuplicateSort { .. })
    ));
}

#[test]
fn parametric_instances_are_canonical_and_respect_variance() {
    let reg = hierarchy();
    let shape = reg.get("Shape").unwrap();
    let circle = reg.get("Circle").unwrap();
    let list = reg.parametric_decl("List").unwrap().name.clone();
    let cell = reg.parametric_decl("Ref").unwrap().name.clone();

    let circles = reg.instantiate_parametric(&list, [circle.clone()]).unwrap();
    let shapes = reg.instantiate_parametric(&list, [shape.clone()]).unwrap();
    assert_eq!(circles, reg.instantiate_parametric(&list, [circle.clone()]).unwrap());
    assert_eq!(circles.name().as_str(), "List<[Circle]>");
    assert!(circles.extends_trans(&shapes));
    assert!(!shapes.extends_trans(&circles));

    let circle_ref = reg.instantiate_parametric(&cell, [circle.clone()]).unwrap();
    let shape_ref = reg.instantiate_parametric(&cell, [shape]).unwrap();
    assert!(!circle_ref.extends_trans(&shape_ref));
    assert!(circle_ref.extends_trans(&reg.get("Object").unwrap()));

    assert!(matches!(
        reg.instantiate_parametric(&list, [circle.clone(), circle]),
        Err(Error::ParametricArity { .. })
    ));
}

#[test]
fn generic_sorts_resolve_to_the_most_specific_candidate() {
    let reg = hierarchy();
    let g = reg.declare_generic("G", &["Object"], &[]).unwrap();
    let circle = reg.get("Circle").unwrap();
    let square = reg.get("Square").unwrap();

    let conditions = GenericSortCondition::collect(&g, &circle, false).unwrap();
    let resolved = GenericSortInstantiations::resolve(conditions.iter(), &reg).unwrap();
    assert_eq!(resolved.get(&g), Some(&circle));

    // Two unrelated lower bounds meet at their common super-sort.
    let mut both = conditions.to_vec();
    both.extend(GenericSortCondition::collect(&g, &square, false).unwrap());
    let resolved = GenericSortInstantiations::resolve(both.iter(), &reg).unwrap();
    assert_eq!(resolved.get(&g), Some(&reg.get("Shape").unwrap()));

    let strict = GenericSortCondition::collect(&g, &circle, true).unwrap();
    let mut clash = strict.to_vec();
    clash.extend(GenericSortCondition::collect(&g, &square, true).unwrap());
    assert!(matches!(
        GenericSortInstantiations::resolve(clash.iter(), &reg),
        Err(Error::UnresolvableGenericSort { .. })
    ));
}

#[test]
fn generic_bounds_restrict_candidates() {
    let reg = hierarchy();
    let g = reg.declare_generic("H", &["Shape"], &[]).unwrap();
    let label = reg.get("Label").unwrap();
    let conditions = GenericSortCondition::collect(&g, &label, false).unwrap();
    assert!(GenericSortInstantiations::resolve(conditions.iter(), &reg).is_err());

    let one_of = reg.declare_generic("K", &[], &["Circle", "Square"]).unwrap();
    let list = reg.parametric_decl("List").unwrap().name.clone();
    let pattern = reg.instantiate_parametric(&list, [one_of.clone()]).unwrap();
    let found = reg
        .instantiate_parametric(&list, [reg.get("Square").unwrap()])
        .unwrap();
    let conditions = GenericSortCondition::collect(&pattern, &found, false).unwrap();
    let resolved = GenericSortInstantiations::resolve(conditions.iter(), &reg).unwrap();
    assert_eq!(resolved.realize(&pattern, &reg).unwrap(), found);
}
