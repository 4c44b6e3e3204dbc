/// Resolves a resource id into a `@[<package>:]<type>/<name>` string.
///
/// Any `Fn(u32) -> String` closure can be used as a resolver.
pub trait ResourceIdResolver {
    fn resolve(&self, id: u32) -> String;
}

/// Resolver that does not look anything up and prints the id as `@ref/0x<hex>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResolution;

impl ResourceIdResolver for NoResolution {
    fn resolve(&self, id: u32) -> String {
        format!("@ref/0x{id:x}")
    }
}

impl<F> ResourceIdResolver for F
where
    F: Fn(u32) -> String,
{
    fn resolve(&self, id: u32) -> String {
        self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resolution_prints_hex() {
        assert_eq!(NoResolution.resolve(0x0101_0000), "@ref/0x1010000");
        assert_eq!(NoResolution.resolve(0x7f08_002a), "@ref/0x7f08002a");
    }

    #[test]
    fn closures_are_resolvers() {
        let names = |id: u32| match id {
            0x0101_0003 => "@android:attr/name".to_string(),
            other => format!("@unknown/{other}"),
        };
        assert_eq!(names.resolve(0x0101_0003), "@android:attr/name");
        assert_eq!(names.resolve(7), "@unknown/7");
    }
}
