#[path = "../common/fixtures.rs"]
mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::{CustomElement, Node, User};
    use relmap::{
        descriptor_of, Criteria, CriteriaGroup, Operator, QueryBuilder, Sort, SortDir, Value,
    };

    #[test]
    fn test_root_only_query_at_depth_zero() {
        let desc = descriptor_of::<Node>().unwrap();
        let query = QueryBuilder::new(desc).fetch_depth(0).build().unwrap();
        assert_eq!(
            query.sql,
            "SELECT tbNode.ID, tbNode.ParentID, tbNode.Name FROM tbNode ORDER BY tbNode.ID DESC"
        );
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_self_reference_joins_once_then_stops() {
        let desc = descriptor_of::<Node>().unwrap();
        let query = QueryBuilder::new(desc).build().unwrap();
        assert_eq!(
            query.sql,
            "SELECT tbNode.ID, tbNode.ParentID, tbNode.Name, \
             tbNode_children.ID AS \"tbNode_children.ID\", \
             tbNode_children.ParentID AS \"tbNode_children.ParentID\", \
             tbNode_children.Name AS \"tbNode_children.Name\" \
             FROM tbNode \
             LEFT JOIN tbNode tbNode_children ON tbNode_children.ParentID = tbNode.ID \
             ORDER BY tbNode.ID DESC"
        );
    }

    #[test]
    fn test_full_user_query_joins_children_grandchildren_and_pivot() {
        let desc = descriptor_of::<User>().unwrap();
        let query = QueryBuilder::new(desc).build().unwrap();

        assert!(query
            .sql
            .starts_with("SELECT tbUser.ID, tbUser.Name, tbUser.CreatedAt, "));
        // one-to-many child with its alias namespace
        assert!(query.sql.contains(
            " LEFT JOIN tbAddress tbUser_addresses ON tbUser_addresses.UserID = tbUser.ID"
        ));
        assert!(query
            .sql
            .contains("tbUser_addresses.Street AS \"tbUser_addresses.Street\""));
        // to-one grandchild hangs off the child alias
        assert!(query.sql.contains(
            " LEFT JOIN tbAddressType tbAddress_category ON tbAddress_category.ID = tbUser_addresses.TypeID"
        ));
        // many-to-many goes through the pivot in two joins
        assert!(query
            .sql
            .contains(" LEFT JOIN tbUserRole ON tbUserRole.UserID = tbUser.ID"));
        assert!(query
            .sql
            .contains(" LEFT JOIN tbRole tbUser_roles ON tbUserRole.RoleID = tbUser_roles.ID"));
        assert!(query.sql.ends_with(" ORDER BY tbUser.ID DESC"));
    }

    #[test]
    fn test_fetch_depth_one_excludes_grandchildren() {
        let desc = descriptor_of::<User>().unwrap();
        let query = QueryBuilder::new(desc).fetch_depth(1).build().unwrap();
        assert!(query.sql.contains("LEFT JOIN tbAddress tbUser_addresses"));
        assert!(!query.sql.contains("tbAddress_category"));
    }

    #[test]
    fn test_filter_scopes_to_root_table_and_binds_parameters() {
        let desc = descriptor_of::<User>().unwrap();
        let filter = CriteriaGroup::of(Criteria::new("Name", Operator::Equals, "Tom"));
        let query = QueryBuilder::new(desc).filter(&filter).build().unwrap();
        assert!(query.sql.contains(" WHERE (tbUser.Name = ?)"));
        assert_eq!(query.params, vec![Value::Text("Tom".into())]);
        // WHERE sits between the joins and the ORDER BY
        let where_pos = query.sql.find(" WHERE ").unwrap();
        let order_pos = query.sql.find(" ORDER BY ").unwrap();
        assert!(where_pos < order_pos);
    }

    #[test]
    fn test_explicit_sort_replaces_default() {
        let desc = descriptor_of::<User>().unwrap();
        let sort = Sort::by("tbUser.Name", SortDir::Asc);
        let query = QueryBuilder::new(desc).sort(&sort).build().unwrap();
        assert!(query.sql.ends_with(" ORDER BY tbUser.Name ASC"));
        assert!(!query.sql.contains("tbUser.ID DESC"));
    }

    #[test]
    fn test_custom_select_is_spliced_verbatim() {
        let desc = descriptor_of::<CustomElement>().unwrap();
        let query = QueryBuilder::new(desc).build().unwrap();
        assert_eq!(
            query.sql,
            "SELECT tbUser.ID AS CustomElementID, tbUser.Name AS CustomName, \
             3 AS CustomAmount FROM tbUser"
        );
    }

    #[test]
    fn test_custom_select_filter_is_unaliased() {
        let desc = descriptor_of::<CustomElement>().unwrap();
        let filter = CriteriaGroup::of(Criteria::new("CustomName", Operator::Equals, "Tom"));
        let query = QueryBuilder::new(desc).filter(&filter).build().unwrap();
        assert!(query.sql.ends_with(" WHERE (CustomName = ?)"));
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn test_count_query_skips_joins() {
        let desc = descriptor_of::<User>().unwrap();
        let filter = CriteriaGroup::of(Criteria::new("Name", Operator::Contains, "om"));
        let query = QueryBuilder::new(desc).filter(&filter).build_count().unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(DISTINCT tbUser.ID) FROM tbUser WHERE (tbUser.Name LIKE ?)"
        );
        assert_eq!(query.params, vec![Value::Text("%om%".into())]);
    }
}
