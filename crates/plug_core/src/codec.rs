//! Codec do protocolo TCP da tomada (porta 9999).
//!
//! Cada mensagem é um JSON ofuscado por um XOR autossincronizante,
//! precedido pelo tamanho do texto original:
//!
//! ```text
//! ┌─────────────────┬───────────────────────────┐
//! │ Tamanho (4, BE) │ Payload ofuscado (N)      │
//! └─────────────────┴───────────────────────────┘
//! ```
//!
//! A chave começa em [`INITIAL_KEY`] e, após cada byte, passa a ser o byte
//! *cifrado* recém-produzido (ou consumido, na decodificação). Não é
//! criptografia, só evita inspeção ingênua de pacotes; mas a sequência tem
//! que ser reproduzida bit a bit para conversar com o hardware real.

/// Valor inicial da chave em toda codificação/decodificação.
pub const INITIAL_KEY: u8 = 171;

/// Tamanho do prefixo de comprimento.
pub const HEADER_SIZE: usize = 4;

/// Maior payload aceito vindo da rede.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Erros de framing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame muito curto ({0} bytes, mínimo {HEADER_SIZE})")]
    TooShort(usize),

    #[error("Frame truncado: prefixo declara {declared} bytes, recebidos {available}")]
    Truncated { declared: usize, available: usize },

    #[error("Frame declara {0} bytes (máximo {MAX_FRAME_LEN})")]
    Oversized(usize),
}

/// Aplica a ofuscação em `plain`, sem prefixo.
pub fn obfuscate(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|&b| {
            key ^= b;
            key
        })
        .collect()
}

/// Inverso de [`obfuscate`]: a chave segue o byte cifrado consumido.
pub fn deobfuscate(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&c| {
            let plain = key ^ c;
            key = c;
            plain
        })
        .collect()
}

/// Monta um frame completo: `[len BE][ofuscado...]`.
///
/// O comprimento é o do payload original (igual ao cifrado, o XOR não muda
/// o tamanho).
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&obfuscate(payload));
    frame
}

/// Lê o comprimento declarado num cabeçalho.
pub fn frame_len(header: &[u8; HEADER_SIZE]) -> usize {
    u32::from_be_bytes(*header) as usize
}

/// Decodifica um frame completo, removendo o prefixo internamente.
///
/// Bytes além do comprimento declarado são ignorados.
pub fn decode_frame(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < HEADER_SIZE {
        return Err(CodecError::TooShort(data.len()));
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&data[..HEADER_SIZE]);
    let declared = frame_len(&header);
    if declared > MAX_FRAME_LEN {
        return Err(CodecError::Oversized(declared));
    }

    let body = &data[HEADER_SIZE..];
    if body.len() < declared {
        return Err(CodecError::Truncated {
            declared,
            available: body.len(),
        });
    }

    Ok(deobfuscate(&body[..declared]))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
