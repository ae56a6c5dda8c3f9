//! Correlated users-table lookups for user-typed values.

use crate::config::UserTableSettings;
use crate::sql::expr::{func, lit_str, table_col, Expr, ExprExt};
use crate::sql::query::{Query, TableRef};

const USERS_ALIAS: &str = "u";

fn users_by_id(users: &UserTableSettings, id: Expr) -> Query {
    Query::new()
        .from(TableRef::qualified(&users.table).with_alias(USERS_ALIAS))
        .filter(table_col(USERS_ALIAS, &users.id_column).eq(id))
        .limit(1)
}

/// `(SELECT u.name FROM users u WHERE u.id = <id> LIMIT 1)`
pub fn user_name(users: &UserTableSettings, id: Expr) -> Expr {
    users_by_id(users, id)
        .select(vec![table_col(USERS_ALIAS, &users.name_column)])
        .into()
}

/// `{id, title, email, avatarUrl}` object of the user with the given id.
pub fn user_object(users: &UserTableSettings, id: Expr) -> Expr {
    let user_id = table_col(USERS_ALIAS, &users.id_column);
    let object = func(
        "jsonb_build_object",
        vec![
            lit_str("id"),
            user_id.clone(),
            lit_str("title"),
            table_col(USERS_ALIAS, &users.name_column),
            lit_str("email"),
            table_col(USERS_ALIAS, &users.email_column),
            lit_str("avatarUrl"),
            lit_str(&users.avatar_url_prefix).concat(user_id),
        ],
    );
    users_by_id(users, id).select(vec![object]).into()
}
