#[path = "../common/fixtures.rs"]
mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::{CustomUserView, User};
    use relmap::{descriptor_of, hydrate, Row, Value};

    fn row(cells: &[(&str, Value)]) -> Row {
        cells
            .iter()
            .cloned()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn user_row(
        user_id: i64,
        name: &str,
        addr: Option<(i64, &str, Option<i64>)>,
        role: Option<(i64, &str)>,
    ) -> Row {
        let mut cells: Vec<(String, Value)> = vec![
            ("ID".to_string(), Value::Integer(user_id)),
            ("Name".to_string(), Value::from(name)),
            ("CreatedAt".to_string(), Value::from("2020-01-01 10:00:00")),
        ];
        match addr {
            Some((id, street, type_id)) => {
                cells.push(("tbUser_addresses.ID".to_string(), Value::Integer(id)));
                cells.push(("tbUser_addresses.UserID".to_string(), Value::Integer(user_id)));
                cells.push(("tbUser_addresses.Street".to_string(), Value::from(street)));
                cells.push((
                    "tbUser_addresses.TypeID".to_string(),
                    Value::from(type_id),
                ));
                cells.push((
                    "tbAddress_category.ID".to_string(),
                    Value::from(type_id),
                ));
                cells.push((
                    "tbAddress_category.Name".to_string(),
                    type_id.map_or(Value::Null, |_| Value::from("home")),
                ));
            }
            None => {
                cells.push(("tbUser_addresses.ID".to_string(), Value::Null));
                cells.push(("tbAddress_category.ID".to_string(), Value::Null));
            }
        }
        match role {
            Some((id, name)) => {
                cells.push(("tbUser_roles.ID".to_string(), Value::Integer(id)));
                cells.push(("tbUser_roles.Name".to_string(), Value::from(name)));
            }
            None => cells.push(("tbUser_roles.ID".to_string(), Value::Null)),
        }
        cells.into_iter().collect()
    }

    fn as_users(entities: Vec<Box<dyn relmap::Entity>>) -> Vec<User> {
        entities
            .into_iter()
            .map(|e| *e.downcast::<User>().expect("hydrated a User"))
            .collect()
    }

    #[test]
    fn test_fan_out_rows_deduplicate_into_one_graph() {
        let desc = descriptor_of::<User>().unwrap();
        // one root, two addresses, two roles: the join fans out to 4 rows;
        // the category exists under the first address only
        let rows = vec![
            user_row(1, "Tom", Some((10, "Elmstreet", Some(100))), Some((7, "admin"))),
            user_row(1, "Tom", Some((10, "Elmstreet", Some(100))), Some((8, "user"))),
            user_row(1, "Tom", Some((11, "Testplace", None)), Some((7, "admin"))),
            user_row(1, "Tom", Some((11, "Testplace", None)), Some((8, "user"))),
        ];
        let users = as_users(hydrate(desc, &rows).unwrap());

        assert_eq!(users.len(), 1);
        let user = &users[0];
        assert_eq!(user.id, Some(1));
        assert_eq!(user.name.as_deref(), Some("Tom"));
        assert_eq!(user.addresses.len(), 2);
        assert_eq!(user.roles.len(), 2);

        assert_eq!(user.addresses[0].id, Some(10));
        assert_eq!(user.addresses[0].category.as_ref().and_then(|c| c.id), Some(100));
        assert_eq!(user.addresses[1].id, Some(11));
        assert!(user.addresses[1].category.is_none());
    }

    #[test]
    fn test_to_one_target_shared_by_siblings_attaches_under_each() {
        let desc = descriptor_of::<User>().unwrap();
        // both addresses reference address type 7
        let rows = vec![
            user_row(1, "Tom", Some((10, "Elmstreet", Some(7))), None),
            user_row(1, "Tom", Some((11, "Testplace", Some(7))), None),
        ];
        let users = as_users(hydrate(desc, &rows).unwrap());

        assert_eq!(users.len(), 1);
        let user = &users[0];
        assert_eq!(user.addresses.len(), 2);
        for address in &user.addresses {
            assert_eq!(address.category.as_ref().and_then(|c| c.id), Some(7));
        }
    }

    #[test]
    fn test_custom_select_children_hydrate_under_attribute_aliases() {
        let desc = descriptor_of::<CustomUserView>().unwrap();
        let address_row = |addr_id: i64, street: &str| {
            row(&[
                ("ID", Value::Integer(1)),
                ("Name", Value::from("Tom")),
                ("addresses.ID", Value::Integer(addr_id)),
                ("addresses.UserID", Value::Integer(1)),
                ("addresses.Street", Value::from(street)),
            ])
        };
        let rows = vec![
            address_row(10, "Elmstreet"),
            address_row(11, "Testplace"),
        ];

        let views: Vec<CustomUserView> = hydrate(desc, &rows)
            .unwrap()
            .into_iter()
            .map(|e| *e.downcast::<CustomUserView>().expect("hydrated a view"))
            .collect();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].addresses.len(), 2);
        assert_eq!(views[0].addresses[0].street.as_deref(), Some("Elmstreet"));
    }

    #[test]
    fn test_scalars_are_not_reapplied_on_seen_roots() {
        let desc = descriptor_of::<User>().unwrap();
        let mut second = user_row(1, "Tom", Some((11, "Testplace", None)), None);
        // fan-out rows can carry NULLs for already-seen nodes
        second = second
            .iter()
            .map(|(k, v)| {
                let v = if k == "Name" { Value::Null } else { v.clone() };
                (k.to_string(), v)
            })
            .collect();

        let rows = vec![
            user_row(1, "Tom", Some((10, "Elmstreet", None)), None),
            second,
        ];
        let users = as_users(hydrate(desc, &rows).unwrap());
        assert_eq!(users[0].name.as_deref(), Some("Tom"));
        assert_eq!(users[0].addresses.len(), 2);
    }

    #[test]
    fn test_roots_keep_first_seen_order() {
        let desc = descriptor_of::<User>().unwrap();
        let rows = vec![
            user_row(2, "Tim", None, None),
            user_row(1, "Tom", None, None),
            user_row(2, "Tim", None, None),
        ];
        let users = as_users(hydrate(desc, &rows).unwrap());
        let ids: Vec<_> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![Some(2), Some(1)]);
    }

    #[test]
    fn test_outer_join_miss_leaves_relations_empty() {
        let desc = descriptor_of::<User>().unwrap();
        let rows = vec![user_row(1, "Tom", None, None)];
        let users = as_users(hydrate(desc, &rows).unwrap());
        assert!(users[0].addresses.is_empty());
        assert!(users[0].roles.is_empty());
    }

    #[test]
    fn test_rows_without_root_key_are_skipped() {
        let desc = descriptor_of::<User>().unwrap();
        let rows = vec![row(&[("ID", Value::Null), ("Name", Value::from("ghost"))])];
        assert!(hydrate(desc, &rows).unwrap().is_empty());
    }

    #[test]
    fn test_column_matching_is_case_insensitive() {
        let desc = descriptor_of::<User>().unwrap();
        let rows = vec![row(&[
            ("id", Value::Integer(5)),
            ("name", Value::from("Tina")),
            ("tbuser_addresses.id", Value::Integer(20)),
            ("tbuser_addresses.street", Value::from("Lowercase Lane")),
        ])];
        let users = as_users(hydrate(desc, &rows).unwrap());
        assert_eq!(users[0].id, Some(5));
        assert_eq!(users[0].addresses.len(), 1);
        assert_eq!(
            users[0].addresses[0].street.as_deref(),
            Some("Lowercase Lane")
        );
    }
}
