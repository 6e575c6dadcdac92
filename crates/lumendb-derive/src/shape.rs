use syn::{GenericArgument, PathArguments, Type};

///
/// Shape
///
/// How a field holds what it reads: a single required value, an optional
/// one, or a collection.
///

#[derive(Clone, Copy)]
pub enum Shape<'a> {
    One(&'a Type),
    Opt(&'a Type),
    Many(&'a Type),
}

impl<'a> Shape<'a> {
    pub fn of(ty: &'a Type) -> Self {
        if let Some(inner) = generic_argument(ty, "Option") {
            Self::Opt(inner)
        } else if let Some(inner) =
            generic_argument(ty, "Vec").or_else(|| generic_argument(ty, "BTreeSet"))
        {
            Self::Many(inner)
        } else {
            Self::One(ty)
        }
    }

    /// The single value inside an `Option`, or the field type itself.
    /// Collections read as a whole.
    pub const fn value(self, ty: &'a Type) -> &'a Type {
        match self {
            Self::Opt(inner) => inner,
            Self::One(_) | Self::Many(_) => ty,
        }
    }

    /// Element type of a collection, the inner type of an `Option`.
    pub const fn element(self) -> &'a Type {
        match self {
            Self::One(ty) | Self::Opt(ty) | Self::Many(ty) => ty,
        }
    }
}

fn generic_argument<'a>(ty: &'a Type, ident: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };

    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

///
/// TESTS
///
