#[cfg(test)]
mod tests {
    use relmap::{Criteria, CriteriaGroup, Error, Operator, Value, WherePart};

    #[test]
    fn test_equals_renders_with_alias_and_parameter() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::Equals, "Tom"));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(part.sql, "(tbUser.Name = ?)");
        assert_eq!(part.params, vec![Value::Text("Tom".into())]);
    }

    #[test]
    fn test_unaliased_compile_leaves_columns_bare() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::NotEqual, "Tom"));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(part.sql, "(Name <> ?)");
    }

    #[test]
    fn test_empty_group_compiles_to_always_true() {
        let part = WherePart::compile(Some("tbUser"), &CriteriaGroup::and()).unwrap();
        assert_eq!(part.sql, "(1 = 1)");
        assert!(part.params.is_empty());
    }

    #[test]
    fn test_siblings_joined_by_group_operator() {
        let group = CriteriaGroup::or()
            .add(Criteria::new("Street", Operator::Equals, "Elmstreet"))
            .add(Criteria::new("Street", Operator::Equals, "Testplace"));
        let part = WherePart::compile(Some("tbAddress"), &group).unwrap();
        assert_eq!(
            part.sql,
            "(tbAddress.Street = ? OR tbAddress.Street = ?)"
        );
        assert_eq!(part.params.len(), 2);
    }

    #[test]
    fn test_nested_group_is_parenthesized_and_spliced() {
        let nested = CriteriaGroup::or()
            .add(Criteria::new("Name", Operator::Equals, "Tom"))
            .add(Criteria::new("Name", Operator::Equals, "Tim"));
        let group = CriteriaGroup::and()
            .add(Criteria::unary("CreatedAt", Operator::NotNull))
            .add(Criteria::group(nested));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(
            part.sql,
            "(tbUser.CreatedAt IS NOT NULL AND (tbUser.Name = ? OR tbUser.Name = ?))"
        );
    }

    #[test]
    fn test_empty_nested_group_vanishes() {
        let group = CriteriaGroup::and()
            .add(Criteria::group(CriteriaGroup::or()))
            .add(Criteria::new("ID", Operator::GreaterThan, 5));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(part.sql, "(tbUser.ID > ?)");
    }

    #[test]
    fn test_parameter_order_is_left_to_right() {
        let group = CriteriaGroup::and()
            .add(Criteria::new("A", Operator::Equals, 1))
            .add(Criteria::new("B", Operator::LessThan, 2))
            .add(Criteria::new("C", Operator::GreaterOrEqual, 3));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(
            part.params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_contains_wraps_value_in_wildcards() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::Contains, "om"));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(part.sql, "(tbUser.Name LIKE ?)");
        assert_eq!(part.params, vec![Value::Text("%om%".into())]);
    }

    #[test]
    fn test_icontains_lowers_both_sides() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::IContains, "OM"));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(part.sql, "(LOWER(tbUser.Name) LIKE LOWER(?))");
        assert_eq!(part.params, vec![Value::Text("%OM%".into())]);
    }

    #[test]
    fn test_starts_with_appends_single_wildcard() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::StartsWith, "To"));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(part.sql, "(Name LIKE ?)");
        assert_eq!(part.params, vec![Value::Text("To%".into())]);
    }

    #[test]
    fn test_ends_with_prepends_single_wildcard() {
        let group = CriteriaGroup::of(Criteria::new("Name", Operator::IEndsWith, "om"));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(part.sql, "(LOWER(Name) LIKE LOWER(?))");
        assert_eq!(part.params, vec![Value::Text("%om".into())]);
    }

    #[test]
    fn test_iequals_lowers_strings_only() {
        let text = CriteriaGroup::of(Criteria::new("Name", Operator::IEquals, "tom"));
        let part = WherePart::compile(None, &text).unwrap();
        assert_eq!(part.sql, "(LOWER(Name) LIKE LOWER(?))");

        let number = CriteriaGroup::of(Criteria::new("ID", Operator::IEquals, 7));
        let part = WherePart::compile(None, &number).unwrap();
        assert_eq!(part.sql, "(ID LIKE ?)");
        assert_eq!(part.params, vec![Value::Integer(7)]);
    }

    #[test]
    fn test_blank_and_null_operators_take_no_parameters() {
        let group = CriteriaGroup::and()
            .add(Criteria::unary("Name", Operator::IsBlank))
            .add(Criteria::unary("Street", Operator::NotBlank))
            .add(Criteria::unary("CreatedAt", Operator::IsNull));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(
            part.sql,
            "((Name = '' OR Name IS NULL) AND \
             (Street != '' AND Street IS NOT NULL) AND \
             CreatedAt IS NULL)"
        );
        assert!(part.params.is_empty());
    }

    #[test]
    fn test_in_set_emits_one_placeholder_per_element() {
        let values = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
        let group = CriteriaGroup::of(Criteria::new("ID", Operator::InSet, values.clone()));
        let part = WherePart::compile(Some("tbUser"), &group).unwrap();
        assert_eq!(part.sql, "(tbUser.ID IN (?,?,?))");
        assert_eq!(part.params, values);
    }

    #[test]
    fn test_between_takes_exactly_two_parameters_in_order() {
        let group = CriteriaGroup::of(Criteria::new(
            "ID",
            Operator::Between,
            vec![Value::Integer(10), Value::Integer(20)],
        ));
        let part = WherePart::compile(None, &group).unwrap();
        assert_eq!(part.sql, "(ID BETWEEN ? AND ?)");
        assert_eq!(part.params, vec![Value::Integer(10), Value::Integer(20)]);
    }

    #[test]
    fn test_between_rejects_wrong_arity() {
        let group = CriteriaGroup::of(Criteria::new(
            "ID",
            Operator::Between,
            vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)],
        ));
        let err = WherePart::compile(None, &group).unwrap_err();
        assert!(matches!(err, Error::BetweenArity { got: 3 }));
    }

    #[test]
    fn test_list_value_rejected_for_scalar_operator() {
        let group = CriteriaGroup::of(Criteria::new(
            "ID",
            Operator::Equals,
            vec![Value::Integer(1)],
        ));
        let err = WherePart::compile(None, &group).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedListValue {
                operator: Operator::Equals
            }
        ));
    }

    #[test]
    fn test_list_operator_requires_list_value() {
        let group = CriteriaGroup::of(Criteria::new("ID", Operator::InSet, 1));
        let err = WherePart::compile(None, &group).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingListValue {
                operator: Operator::InSet
            }
        ));
    }

    #[test]
    fn test_scalar_operator_requires_value() {
        let group = CriteriaGroup::of(Criteria::unary("ID", Operator::Equals));
        let err = WherePart::compile(None, &group).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingValue {
                operator: Operator::Equals
            }
        ));
    }

    #[test]
    fn test_known_column_check_is_case_insensitive() {
        let columns = vec!["ID".to_string(), "Name".to_string()];
        let group = CriteriaGroup::of(Criteria::new("name", Operator::Equals, "Tom"));
        assert!(WherePart::compile_checked(Some("tbUser"), &group, Some(&columns)).is_ok());

        let group = CriteriaGroup::of(Criteria::new("Street", Operator::Equals, "x"));
        let err = WherePart::compile_checked(Some("tbUser"), &group, Some(&columns)).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_field_name_injection_is_rejected() {
        let group = CriteriaGroup::of(Criteria::new(
            "Name = '' OR 1=1 --",
            Operator::Equals,
            "x",
        ));
        let err = WherePart::compile(Some("tbUser"), &group).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }
}
