use crate::permission::PermissionIndex;

/// One side of a `can` query: a single value or a list folded with AND.
#[derive(Debug, Clone)]
pub enum Query<'a> {
    /// A single action or object.
    One(&'a str),
    /// A list of actions or objects; the query holds only if every entry holds.
    Many(Vec<&'a str>),
}

impl<'a> From<&'a str> for Query<'a> {
    fn from(value: &'a str) -> Self {
        Self::One(value)
    }
}

impl<'a> From<&'a String> for Query<'a> {
    fn from(value: &'a String) -> Self {
        Self::One(value)
    }
}

impl<'a> From<&'a [&'a str]> for Query<'a> {
    fn from(value: &'a [&'a str]) -> Self {
        Self::Many(value.to_vec())
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for Query<'a> {
    fn from(value: [&'a str; N]) -> Self {
        Self::Many(value.to_vec())
    }
}

impl<'a, const N: usize> From<&'a [&'a str; N]> for Query<'a> {
    fn from(value: &'a [&'a str; N]) -> Self {
        Self::Many(value.to_vec())
    }
}

impl<'a> From<Vec<&'a str>> for Query<'a> {
    fn from(value: Vec<&'a str>) -> Self {
        Self::Many(value)
    }
}

/// Default-deny/allow function consulted for actions absent from the index.
pub(crate) type Fallback = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

pub(crate) fn deny_all() -> Fallback {
    Box::new(|_, _| false)
}

/// Resolves a query against a permission snapshot.
///
/// Lists AND-fold; a scalar pair answers from the snapshot, falling through to
/// the fallback when the snapshot is absent or does not know the action.
pub(crate) fn check(
    permissions: Option<&PermissionIndex>,
    fallback: &Fallback,
    action: &Query<'_>,
    object: &Query<'_>,
) -> bool {
    match action {
        Query::Many(actions) => actions
            .iter()
            .all(|action| check(permissions, fallback, &Query::One(action), object)),
        Query::One(action) => match object {
            Query::Many(objects) => objects
                .iter()
                .all(|object| check_one(permissions, fallback, action, object)),
            Query::One(object) => check_one(permissions, fallback, action, object),
        },
    }
}

fn check_one(
    permissions: Option<&PermissionIndex>,
    fallback: &Fallback,
    action: &str,
    object: &str,
) -> bool {
    permissions
        .and_then(|index| index.grants(action, object))
        .unwrap_or_else(|| fallback(action, object))
}

/// Synchronous authorizer over a permission producer.
///
/// The producer is invoked on every query; callers own memoization when it is
/// expensive. The fallback (default: deny) answers queries for actions the
/// produced index does not know.
pub struct Authorizer<P> {
    producer: P,
    fallback: Fallback,
}

impl Authorizer<Box<dyn Fn() -> Option<PermissionIndex> + Send + Sync>> {
    /// Creates an authorizer over a fixed permission index.
    pub fn from_index(index: PermissionIndex) -> Self {
        Self::new(Box::new(move || Some(index.clone())))
    }
}

impl<P> Authorizer<P>
where
    P: Fn() -> Option<PermissionIndex>,
{
    /// Creates an authorizer invoking `producer` on each query.
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            fallback: deny_all(),
        }
    }

    /// Replaces the fallback consulted for unknown actions.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    /// Returns the currently produced permission index, if any.
    pub fn permissions(&self) -> Option<PermissionIndex> {
        (self.producer)()
    }

    /// Answers whether every action in `action` covers every object in `object`.
    pub fn can<'a, 'o>(&self, action: impl Into<Query<'a>>, object: impl Into<Query<'o>>) -> bool {
        self.query(&action.into(), &object.into())
    }

    /// Binds one action for repeated object queries:
    /// `auth.action("read").can("data")` equals `auth.can("read", "data")`.
    pub fn action<'s>(&'s self, action: &'s str) -> ActionQuery<'s> {
        ActionQuery::bind(move |object| self.query(&Query::One(action), object))
    }

    fn query(&self, action: &Query<'_>, object: &Query<'_>) -> bool {
        let permissions = (self.producer)();
        check(permissions.as_ref(), &self.fallback, action, object)
    }
}

/// A `can` query with the action bound ahead of time.
pub struct ActionQuery<'a> {
    check: Box<dyn Fn(&Query<'_>) -> bool + 'a>,
}

impl<'a> ActionQuery<'a> {
    pub(crate) fn bind(check: impl Fn(&Query<'_>) -> bool + 'a) -> Self {
        Self {
            check: Box::new(check),
        }
    }

    /// Answers whether the bound action covers every object in `object`.
    pub fn can<'o>(&self, object: impl Into<Query<'o>>) -> bool {
        (self.check)(&object.into())
    }
}
