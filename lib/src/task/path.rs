// Copyright (c) 2022-2023 The MobileCoin Foundation

//! BIP32 derivation path encoding

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// Maximum number of path components accepted by device applications
pub const MAX_PATH_DEPTH: usize = 10;

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum PathError {
    #[error("invalid path component '{0}'")]
    InvalidComponent(String),
    #[error("path too deep ({0} components)")]
    TooDeep(usize),
}

/// Parse a path such as `m/44'/60'/0'/0/0` into its components
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>, PathError> {
    let path = path.strip_prefix("m/").unwrap_or(path);

    let components = path
        .split('/')
        .filter(|c| !c.is_empty())
        .map(|c| {
            let (v, hardened) = match c.strip_suffix('\'').or_else(|| c.strip_suffix('h')) {
                Some(v) => (v, true),
                None => (c, false),
            };

            match v.parse::<u32>() {
                Ok(i) if i < HARDENED => Ok(if hardened { i | HARDENED } else { i }),
                _ => Err(PathError::InvalidComponent(c.to_string())),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if components.len() > MAX_PATH_DEPTH {
        return Err(PathError::TooDeep(components.len()));
    }

    Ok(components)
}

/// Encode a derivation path as a component count followed by big-endian components
pub fn encode_derivation_path(path: &str) -> Result<Vec<u8>, PathError> {
    let components = parse_derivation_path(path)?;

    let mut buff = Vec::with_capacity(1 + components.len() * 4);
    buff.push(components.len() as u8);
    for c in components {
        buff.extend_from_slice(&c.to_be_bytes());
    }

    Ok(buff)
}
