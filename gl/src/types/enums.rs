//! Closed enumerant families.
//!
//! Every family maps a symbolic name to the API constant it stands for.
//! Decoding is fallible: a raw value outside the family produces
//! [`GlError::UnknownEnumerant`] instead of being silently accepted.

use std::fmt;

use crate::error::GlError;

/// Declares an enumerant family with raw conversions and labels.
macro_rules! gl_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $family:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr => $label:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl $name {
            /// Every member of the family, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Name of the family, used in error reports.
            pub const FAMILY: &'static str = $family;

            /// The raw API constant.
            #[inline]
            pub const fn raw(self) -> u32 {
                self as u32
            }

            /// Human-readable label.
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = GlError;

            fn try_from(value: u32) -> Result<Self, GlError> {
                match value {
                    $(v if v == $value => Ok(Self::$variant),)+
                    _ => Err(GlError::UnknownEnumerant {
                        family: $family,
                        value,
                    }),
                }
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(value: $name) -> u32 {
                value.raw()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

// Imaging-subset capabilities are absent from the core-profile bindings.
const COLOR_TABLE: u32 = 0x80D0;
const POST_CONVOLUTION_COLOR_TABLE: u32 = 0x80D1;
const POST_COLOR_MATRIX_COLOR_TABLE: u32 = 0x80D2;
const CONVOLUTION_1D: u32 = 0x8010;
const CONVOLUTION_2D: u32 = 0x8011;
const SEPARABLE_2D: u32 = 0x8012;
const HISTOGRAM: u32 = 0x8024;
const MINMAX: u32 = 0x802E;

gl_enum! {
    /// Component data type of vertex attributes and indices.
    pub enum DataType: "data type" {
        Byte = gl::BYTE => "byte",
        UnsignedByte = gl::UNSIGNED_BYTE => "unsigned byte",
        Short = gl::SHORT => "short",
        UnsignedShort = gl::UNSIGNED_SHORT => "unsigned short",
        Int = gl::INT => "int",
        UnsignedInt = gl::UNSIGNED_INT => "unsigned int",
        Float = gl::FLOAT => "float",
        Double = gl::DOUBLE => "double",
    }
}

impl DataType {
    /// Size of one component in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Whether the type can be used for an element (index) buffer.
    pub const fn is_index_type(self) -> bool {
        matches!(
            self,
            Self::UnsignedByte | Self::UnsignedShort | Self::UnsignedInt
        )
    }
}

gl_enum! {
    /// Usage hint for mutable buffer storage.
    ///
    /// The hints are mutually exclusive, so this is a plain enumerant rather
    /// than a flag family.
    pub enum BufferUsage: "buffer usage" {
        StreamDraw = gl::STREAM_DRAW => "stream draw",
        StreamRead = gl::STREAM_READ => "stream read",
        StreamCopy = gl::STREAM_COPY => "stream copy",
        StaticDraw = gl::STATIC_DRAW => "static draw",
        StaticRead = gl::STATIC_READ => "static read",
        StaticCopy = gl::STATIC_COPY => "static copy",
        DynamicDraw = gl::DYNAMIC_DRAW => "dynamic draw",
        DynamicRead = gl::DYNAMIC_READ => "dynamic read",
        DynamicCopy = gl::DYNAMIC_COPY => "dynamic copy",
    }
}

gl_enum! {
    /// Programmable pipeline stage of a shader object.
    pub enum ShaderStage: "shader stage" {
        Vertex = gl::VERTEX_SHADER => "vertex",
        Fragment = gl::FRAGMENT_SHADER => "fragment",
        Geometry = gl::GEOMETRY_SHADER => "geometry",
        Compute = gl::COMPUTE_SHADER => "compute",
        TessControl = gl::TESS_CONTROL_SHADER => "tessellation control",
        TessEvaluation = gl::TESS_EVALUATION_SHADER => "tessellation evaluation",
    }
}

gl_enum! {
    /// Selector for shader object queries.
    pub enum ShaderParameter: "shader parameter" {
        ShaderType = gl::SHADER_TYPE => "GL_SHADER_TYPE",
        DeleteStatus = gl::DELETE_STATUS => "GL_DELETE_STATUS",
        CompileStatus = gl::COMPILE_STATUS => "GL_COMPILE_STATUS",
        InfoLogLength = gl::INFO_LOG_LENGTH => "GL_INFO_LOG_LENGTH",
        ShaderSourceLength = gl::SHADER_SOURCE_LENGTH => "GL_SHADER_SOURCE_LENGTH",
    }
}

gl_enum! {
    /// Selector for program object queries.
    pub enum ProgramParameter: "program parameter" {
        DeleteStatus = gl::DELETE_STATUS => "GL_DELETE_STATUS",
        LinkStatus = gl::LINK_STATUS => "GL_LINK_STATUS",
        ValidateStatus = gl::VALIDATE_STATUS => "GL_VALIDATE_STATUS",
        InfoLogLength = gl::INFO_LOG_LENGTH => "GL_INFO_LOG_LENGTH",
        AttachedShaders = gl::ATTACHED_SHADERS => "GL_ATTACHED_SHADERS",
        ActiveAttributes = gl::ACTIVE_ATTRIBUTES => "GL_ACTIVE_ATTRIBUTES",
        ActiveAttributeMaxLength = gl::ACTIVE_ATTRIBUTE_MAX_LENGTH => "GL_ACTIVE_ATTRIBUTE_MAX_LENGTH",
        ActiveUniforms = gl::ACTIVE_UNIFORMS => "GL_ACTIVE_UNIFORMS",
        ActiveUniformMaxLength = gl::ACTIVE_UNIFORM_MAX_LENGTH => "GL_ACTIVE_UNIFORM_MAX_LENGTH",
    }
}

gl_enum! {
    /// Server-side capability toggled by [`crate::state::enable`].
    pub enum Capability: "capability" {
        ColorLogicOp = gl::COLOR_LOGIC_OP => "GL_COLOR_LOGIC_OP",
        ColorTable = COLOR_TABLE => "GL_COLOR_TABLE",
        Convolution1D = CONVOLUTION_1D => "GL_CONVOLUTION_1D",
        Convolution2D = CONVOLUTION_2D => "GL_CONVOLUTION_2D",
        CullFace = gl::CULL_FACE => "GL_CULL_FACE",
        DepthTest = gl::DEPTH_TEST => "GL_DEPTH_TEST",
        Dither = gl::DITHER => "GL_DITHER",
        Histogram = HISTOGRAM => "GL_HISTOGRAM",
        LineSmooth = gl::LINE_SMOOTH => "GL_LINE_SMOOTH",
        MinMax = MINMAX => "GL_MINMAX",
        Multisample = gl::MULTISAMPLE => "GL_MULTISAMPLE",
        PolygonOffsetFill = gl::POLYGON_OFFSET_FILL => "GL_POLYGON_OFFSET_FILL",
        PolygonOffsetLine = gl::POLYGON_OFFSET_LINE => "GL_POLYGON_OFFSET_LINE",
        PolygonOffsetPoint = gl::POLYGON_OFFSET_POINT => "GL_POLYGON_OFFSET_POINT",
        PolygonSmooth = gl::POLYGON_SMOOTH => "GL_POLYGON_SMOOTH",
        PostColorMatrixColorTable = POST_COLOR_MATRIX_COLOR_TABLE => "GL_POST_COLOR_MATRIX_COLOR_TABLE",
        PostConvolutionColorTable = POST_CONVOLUTION_COLOR_TABLE => "GL_POST_CONVOLUTION_COLOR_TABLE",
        SampleAlphaToCoverage = gl::SAMPLE_ALPHA_TO_COVERAGE => "GL_SAMPLE_ALPHA_TO_COVERAGE",
        SampleAlphaToOne = gl::SAMPLE_ALPHA_TO_ONE => "GL_SAMPLE_ALPHA_TO_ONE",
        SampleCoverage = gl::SAMPLE_COVERAGE => "GL_SAMPLE_COVERAGE",
        Separable2D = SEPARABLE_2D => "GL_SEPARABLE_2D",
        ScissorTest = gl::SCISSOR_TEST => "GL_SCISSOR_TEST",
        StencilTest = gl::STENCIL_TEST => "GL_STENCIL_TEST",
        Texture1D = gl::TEXTURE_1D => "GL_TEXTURE_1D",
        Texture2D = gl::TEXTURE_2D => "GL_TEXTURE_2D",
        Texture3D = gl::TEXTURE_3D => "GL_TEXTURE_3D",
        TextureCubeMap = gl::TEXTURE_CUBE_MAP => "GL_TEXTURE_CUBE_MAP",
        ProgramPointSize = gl::PROGRAM_POINT_SIZE => "GL_PROGRAM_POINT_SIZE",
        Blend = gl::BLEND => "GL_BLEND",
        DebugOutput = gl::DEBUG_OUTPUT => "GL_DEBUG_OUTPUT",
        DebugOutputSynchronous = gl::DEBUG_OUTPUT_SYNCHRONOUS => "GL_DEBUG_OUTPUT_SYNCHRONOUS",
    }
}

impl Capability {
    /// Whether a core-profile context accepts this capability in `enable`.
    ///
    /// The imaging subset and fixed-function texture targets only exist in
    /// compatibility contexts.
    pub const fn is_core(self) -> bool {
        !matches!(
            self,
            Self::ColorTable
                | Self::Convolution1D
                | Self::Convolution2D
                | Self::Histogram
                | Self::MinMax
                | Self::PostColorMatrixColorTable
                | Self::PostConvolutionColorTable
                | Self::Separable2D
                | Self::Texture1D
                | Self::Texture2D
                | Self::Texture3D
                | Self::TextureCubeMap
        )
    }
}

gl_enum! {
    /// Primitive topology for draw calls.
    pub enum PrimitiveTopology: "primitive topology" {
        Points = gl::POINTS => "points",
        LineStrip = gl::LINE_STRIP => "line strip",
        LineLoop = gl::LINE_LOOP => "line loop",
        Lines = gl::LINES => "lines",
        LineStripAdjacency = gl::LINE_STRIP_ADJACENCY => "line strip adjacency",
        LinesAdjacency = gl::LINES_ADJACENCY => "lines adjacency",
        TriangleStrip = gl::TRIANGLE_STRIP => "triangle strip",
        TriangleFan = gl::TRIANGLE_FAN => "triangle fan",
        Triangles = gl::TRIANGLES => "triangles",
        TriangleStripAdjacency = gl::TRIANGLE_STRIP_ADJACENCY => "triangle strip adjacency",
        TrianglesAdjacency = gl::TRIANGLES_ADJACENCY => "triangles adjacency",
        Patches = gl::PATCHES => "patches",
    }
}

gl_enum! {
    /// Origin of a debug message.
    pub enum DebugSource: "debug source" {
        Api = gl::DEBUG_SOURCE_API => "API",
        WindowSystem = gl::DEBUG_SOURCE_WINDOW_SYSTEM => "WINDOW SYSTEM",
        ShaderCompiler = gl::DEBUG_SOURCE_SHADER_COMPILER => "SHADER COMPILER",
        ThirdParty = gl::DEBUG_SOURCE_THIRD_PARTY => "THIRD PARTY",
        Application = gl::DEBUG_SOURCE_APPLICATION => "APPLICATION",
        Other = gl::DEBUG_SOURCE_OTHER => "OTHER",
    }
}

gl_enum! {
    /// Category of a debug message.
    pub enum DebugKind: "debug type" {
        Error = gl::DEBUG_TYPE_ERROR => "ERROR",
        DeprecatedBehavior = gl::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "DEPRECATED_BEHAVIOR",
        UndefinedBehavior = gl::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "UNDEFINED_BEHAVIOR",
        Portability = gl::DEBUG_TYPE_PORTABILITY => "PORTABILITY",
        Performance = gl::DEBUG_TYPE_PERFORMANCE => "PERFORMANCE",
        Marker = gl::DEBUG_TYPE_MARKER => "MARKER",
        Other = gl::DEBUG_TYPE_OTHER => "OTHER",
    }
}

gl_enum! {
    /// Severity of a debug message.
    pub enum DebugSeverity: "debug severity" {
        Notification = gl::DEBUG_SEVERITY_NOTIFICATION => "NOTIFICATION",
        Low = gl::DEBUG_SEVERITY_LOW => "LOW",
        Medium = gl::DEBUG_SEVERITY_MEDIUM => "MEDIUM",
        High = gl::DEBUG_SEVERITY_HIGH => "HIGH",
    }
}

impl DebugSeverity {
    /// Notifications are informational and never indicate a failure.
    pub const fn is_informational(self) -> bool {
        matches!(self, Self::Notification)
    }
}
