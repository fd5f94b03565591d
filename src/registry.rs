//! Fixed names the codemod knows about: the finder queries that move onto
//! `screen`, the accessor itself and the module it is imported from.

/// The shared query object every rewritten call is routed through.
pub const ACCESSOR: &str = "screen";

/// Module the accessor is imported from.
pub const TESTING_LIBRARY_MODULE: &str = "@testing-library/react";

/// Scoped-query helper; destructuring its result is never a migration target.
pub const SCOPED_QUERY_HELPER: &str = "within";

/// Every `{get|getAll|query|queryAll|find|findAll}By{Target}` finder.
///
/// Kept sorted so lookups can binary-search.
pub const QUERY_METHODS: [&str; 48] = [
    "findAllByAltText",
    "findAllByDisplayValue",
    "findAllByLabelText",
    "findAllByPlaceholderText",
    "findAllByRole",
    "findAllByTestId",
    "findAllByText",
    "findAllByTitle",
    "findByAltText",
    "findByDisplayValue",
    "findByLabelText",
    "findByPlaceholderText",
    "findByRole",
    "findByTestId",
    "findByText",
    "findByTitle",
    "getAllByAltText",
    "getAllByDisplayValue",
    "getAllByLabelText",
    "getAllByPlaceholderText",
    "getAllByRole",
    "getAllByTestId",
    "getAllByText",
    "getAllByTitle",
    "getByAltText",
    "getByDisplayValue",
    "getByLabelText",
    "getByPlaceholderText",
    "getByRole",
    "getByTestId",
    "getByText",
    "getByTitle",
    "queryAllByAltText",
    "queryAllByDisplayValue",
    "queryAllByLabelText",
    "queryAllByPlaceholderText",
    "queryAllByRole",
    "queryAllByTestId",
    "queryAllByText",
    "queryAllByTitle",
    "queryByAltText",
    "queryByDisplayValue",
    "queryByLabelText",
    "queryByPlaceholderText",
    "queryByRole",
    "queryByTestId",
    "queryByText",
    "queryByTitle",
];

/// Exact, case-sensitive membership test against [`QUERY_METHODS`].
pub fn is_query_method(name: &str) -> bool {
    QUERY_METHODS.binary_search(&name).is_ok()
}
