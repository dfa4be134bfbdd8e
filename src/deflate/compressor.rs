// Deflate with an explicit (level, strategy, nowrap) triple, plus inflate.
//
// flate2 cannot select a strategy, so compression goes straight to the zlib
// C API through libz-sys. The bundled zlib is linked statically so output is
// the same on every host. Inflate uses flate2 on the same zlib.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ffi::{CStr, c_int, c_uint, c_void};
use std::io::{self, Read, Write};
use std::ptr;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use libz_sys as zlib;

use super::{DeflateError, DeflateParameters};

const WINDOW_BITS: c_int = 15;
const MEM_LEVEL: c_int = 8;
const CHUNK: usize = 32 * 1024;

// ---------------------------------------------------------------------------
// Allocator handed to zlib
// ---------------------------------------------------------------------------

// Each block carries its size in a header word so zfree can rebuild the layout.
const ALIGN: usize = std::mem::align_of::<usize>();

unsafe extern "C" fn zalloc(_opaque: *mut c_void, items: c_uint, size: c_uint) -> *mut c_void {
    let Some(bytes) = (items as usize)
        .checked_mul(size as usize)
        .and_then(|n| n.checked_add(ALIGN))
    else {
        return ptr::null_mut();
    };
    let Ok(layout) = Layout::from_size_align(bytes, ALIGN) else {
        return ptr::null_mut();
    };
    // SAFETY: layout has non-zero size.
    unsafe {
        let base = alloc::alloc(layout);
        if base.is_null() {
            return ptr::null_mut();
        }
        (base as *mut usize).write(bytes);
        base.add(ALIGN) as *mut c_void
    }
}

unsafe extern "C" fn zfree(_opaque: *mut c_void, address: *mut c_void) {
    if address.is_null() {
        return;
    }
    // SAFETY: `address` came from `zalloc`, which stored the block size one
    // word before it.
    unsafe {
        let base = (address as *mut u8).sub(ALIGN);
        let bytes = (base as *const usize).read();
        alloc::dealloc(base, Layout::from_size_align_unchecked(bytes, ALIGN));
    }
}

/// Version string of the linked zlib.
pub fn zlib_version() -> String {
    // SAFETY: zlibVersion returns a static NUL-terminated string.
    unsafe { CStr::from_ptr(zlib::zlibVersion()) }
        .to_string_lossy()
        .into_owned()
}

// ---------------------------------------------------------------------------
// Deflater
// ---------------------------------------------------------------------------

/// A zlib deflate stream fixed to one parameter set. Reusable: every
/// `compress_*` call produces one complete stream and resets afterwards.
pub struct Deflater {
    // Boxed: zlib keeps a back-pointer to the z_stream, so it must not move.
    stream: Box<zlib::z_stream>,
    params: DeflateParameters,
    buffer: Vec<u8>,
}

impl Deflater {
    pub fn new(params: DeflateParameters) -> Result<Self, DeflateError> {
        let mut stream = Box::new(zlib::z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            zalloc,
            zfree,
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        });
        let window_bits = if params.nowrap() {
            -WINDOW_BITS
        } else {
            WINDOW_BITS
        };
        // SAFETY: `stream` is initialised with valid allocator callbacks and
        // lives in a stable heap location.
        let rc = unsafe {
            zlib::deflateInit2_(
                &mut *stream,
                params.level() as c_int,
                zlib::Z_DEFLATED,
                window_bits,
                MEM_LEVEL,
                params.strategy() as c_int,
                zlib::zlibVersion(),
                std::mem::size_of::<zlib::z_stream>() as c_int,
            )
        };
        if rc != zlib::Z_OK {
            return Err(DeflateError::Init(rc));
        }
        Ok(Self {
            stream,
            params,
            buffer: vec![0u8; CHUNK],
        })
    }

    pub fn params(&self) -> DeflateParameters {
        self.params
    }

    /// Compress `input` as one complete stream into `out`. Returns the number
    /// of compressed bytes written.
    pub fn compress_slice<W: Write + ?Sized>(
        &mut self,
        input: &[u8],
        out: &mut W,
    ) -> Result<u64, DeflateError> {
        let result = self.run(input, zlib::Z_FINISH, out);
        self.finish_stream(result)
    }

    /// Compress everything `input` yields as one complete stream.
    pub fn compress_stream<R: Read + ?Sized, W: Write + ?Sized>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> Result<u64, DeflateError> {
        let result = self.pump(input, out);
        self.finish_stream(result)
    }

    fn pump<R: Read + ?Sized, W: Write + ?Sized>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> Result<(), DeflateError> {
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let n = input.read(&mut chunk)?;
            if n == 0 {
                return self.run(&[], zlib::Z_FINISH, out);
            }
            self.run(&chunk[..n], zlib::Z_NO_FLUSH, out)?;
        }
    }

    // Feed `input` with `flush`, draining output into `out`. With Z_FINISH this
    // runs until the stream ends.
    fn run<W: Write + ?Sized>(
        &mut self,
        input: &[u8],
        flush: c_int,
        out: &mut W,
    ) -> Result<(), DeflateError> {
        let mut rest = input;
        loop {
            let (piece, tail) = rest.split_at(rest.len().min(c_uint::MAX as usize));
            rest = tail;
            let piece_flush = if rest.is_empty() { flush } else { zlib::Z_NO_FLUSH };
            self.stream.next_in = piece.as_ptr() as *mut u8;
            self.stream.avail_in = piece.len() as c_uint;
            loop {
                self.stream.next_out = self.buffer.as_mut_ptr();
                self.stream.avail_out = self.buffer.len() as c_uint;
                // SAFETY: next_in/next_out point into live buffers whose
                // lengths match avail_in/avail_out.
                let rc = unsafe { zlib::deflate(&mut *self.stream, piece_flush) };
                let produced = self.buffer.len() - self.stream.avail_out as usize;
                out.write_all(&self.buffer[..produced])?;
                match rc {
                    zlib::Z_STREAM_END => break,
                    zlib::Z_OK | zlib::Z_BUF_ERROR => {}
                    rc => return Err(DeflateError::Stream(rc)),
                }
                if piece_flush == zlib::Z_NO_FLUSH && self.stream.avail_out != 0 {
                    break;
                }
            }
            if rest.is_empty() {
                break;
            }
        }
        self.stream.next_in = ptr::null_mut();
        self.stream.avail_in = 0;
        Ok(())
    }

    fn finish_stream(&mut self, result: Result<(), DeflateError>) -> Result<u64, DeflateError> {
        let total = self.stream.total_out as u64;
        // SAFETY: the stream was initialised by deflateInit2_.
        let rc = unsafe { zlib::deflateReset(&mut *self.stream) };
        result?;
        if rc != zlib::Z_OK {
            return Err(DeflateError::Stream(rc));
        }
        Ok(total)
    }
}

impl Drop for Deflater {
    fn drop(&mut self) {
        // SAFETY: initialised in `new`; never used after this.
        unsafe {
            zlib::deflateEnd(&mut *self.stream);
        }
    }
}

// SAFETY: the z_stream is exclusively owned and only touched through &mut self.
unsafe impl Send for Deflater {}

/// Lazily-built deflaters, one per parameter set, reused across inputs.
#[derive(Default)]
pub struct DeflaterCache {
    deflaters: HashMap<DeflateParameters, Deflater>,
}

impl DeflaterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, params: DeflateParameters) -> Result<&mut Deflater, DeflateError> {
        use std::collections::hash_map::Entry;
        match self.deflaters.entry(params) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(Deflater::new(params)?)),
        }
    }
}

/// One-shot compression into a new buffer.
pub fn compress(params: DeflateParameters, input: &[u8]) -> Result<Vec<u8>, DeflateError> {
    let mut out = Vec::with_capacity(input.len() / 2 + 64);
    Deflater::new(params)?.compress_slice(input, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Inflate
// ---------------------------------------------------------------------------

/// Inflate one stream from `input` into `out`; raw deflate when `nowrap`,
/// zlib-wrapped otherwise. Returns the number of bytes produced.
///
/// Bytes after the end of the stream are left unread.
pub fn inflate_stream<R: Read, W: Write + ?Sized>(
    input: R,
    nowrap: bool,
    out: &mut W,
) -> io::Result<u64> {
    if nowrap {
        io::copy(&mut DeflateDecoder::new(input), out)
    } else {
        io::copy(&mut ZlibDecoder::new(input), out)
    }
}

/// Inflate `compressed` into a new buffer.
pub fn inflate(compressed: &[u8], nowrap: bool) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(compressed.len() * 3);
    inflate_stream(compressed, nowrap, &mut out)?;
    Ok(out)
}
