use std::collections::HashMap;
use std::sync::OnceLock;

/// Declares the token vocabulary once: each entry pins a variant to its
/// numeric value (the number stored in binary files) and to its canonical
/// lower-case name (the word looked up in text files).
macro_rules! token_ids {
    ($($(#[$meta:meta])* $variant:ident = $value:literal, $name:literal;)*) => {
        /// Identifies the semantic kind of a block.
        ///
        /// The numeric value of each token is what binary content stores in
        /// its block headers; world-file tokens live at 300 and up so that
        /// one enumeration can serve both content families (the opener adds
        /// the 300 offset for files whose sub-header selects it).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum TokenId {
            $($(#[$meta])* $variant = $value,)*
        }

        impl TokenId {
            /// Every token in the vocabulary.
            pub const ALL: &'static [TokenId] = &[$(TokenId::$variant,)*];

            /// The canonical lower-case name used for text-mode lookup.
            pub fn name(self) -> &'static str {
                match self {
                    $(TokenId::$variant => $name,)*
                }
            }

            /// Looks up the token for a binary block header's token number
            /// (after the opener's ID-table offset has been applied).
            pub fn from_number(number: u16) -> Option<TokenId> {
                $(if number == $value {
                    return Some(TokenId::$variant);
                })*
                None
            }
        }
    };
}

token_ids! {
    /// The generic token every unresolvable name collapses onto.
    Comment = 0, "comment";

    // Shape family.
    Shape = 1, "shape";
    ShapeHeader = 2, "shape_header";
    Volumes = 3, "volumes";
    VolSphere = 4, "vol_sphere";
    Points = 5, "points";
    Point = 6, "point";
    UvPoints = 7, "uv_points";
    UvPoint = 8, "uv_point";
    Normals = 9, "normals";
    Vector = 10, "vector";
    Matrices = 11, "matrices";
    Matrix = 12, "matrix";
    Images = 13, "images";
    Image = 14, "image";
    Textures = 15, "textures";
    Texture = 16, "texture";
    PrimState = 17, "prim_state";
    Vertices = 18, "vertices";
    Vertex = 19, "vertex";
    VertexSet = 20, "vertex_set";
    Triangles = 21, "triangles";
    SubObject = 22, "sub_object";
    DistanceLevels = 23, "distance_levels";
    DistanceLevel = 24, "distance_level";
    LodControls = 25, "lod_controls";
    LodControl = 26, "lod_control";
    Animations = 27, "animations";
    Animation = 28, "animation";

    // Wagon and engine family.
    Wagon = 100, "wagon";
    Engine = 101, "engine";
    Type = 102, "type";
    WagonShape = 103, "wagonshape";
    Name = 104, "name";
    Size = 105, "size";
    Mass = 106, "mass";
    MaxReleaseRate = 107, "maxreleaserate";
    MaxApplicationRate = 108, "maxapplicationrate";
    BrakeEquipmentType = 109, "brakeequipmenttype";
    BrakeSystemType = 110, "brakesystemtype";
    CouplingType = 111, "couplingtype";
    Coupling = 112, "coupling";
    Lights = 113, "lights";
    Light = 114, "light";
    Sound = 115, "sound";
    CabView = 116, "cabview";
    MaxPower = 117, "maxpower";
    MaxForce = 118, "maxforce";
    MaxVelocity = 119, "maxvelocity";
    WheelRadius = 120, "wheelradius";
    Friction = 121, "friction";
    NumWheels = 122, "numwheels";
    InertiaTensor = 123, "inertiatensor";

    // World family; these sit at the 300 ID-table offset.
    TrWorldFile = 300, "tr_worldfile";
    TrWatermark = 301, "tr_watermark";
    Static = 302, "static";
    TrackObj = 303, "trackobj";
    CollideObject = 304, "collideobject";
    CollideFlags = 305, "collideflags";
    FileName = 306, "filename";
    Position = 307, "position";
    QDirection = 308, "qdirection";
    VDbId = 309, "vdbid";
    UiD = 310, "uid";
    SectionIdx = 311, "sectionidx";
    Elevation = 312, "elevation";
    JNodePosn = 313, "jnodeposn";
    StaticFlags = 314, "staticflags";
    TrItemId = 315, "tritemid";
}

/// Case-insensitive name table, built on first use and immutable after.
static NAME_TABLE: OnceLock<HashMap<&'static str, TokenId>> = OnceLock::new();

fn name_table() -> &'static HashMap<&'static str, TokenId> {
    NAME_TABLE.get_or_init(|| TokenId::ALL.iter().map(|id| (id.name(), *id)).collect())
}

impl TokenId {
    /// Resolves a textual name to its token, case-insensitively.
    ///
    /// The literal names `skip` and `comment` and any name beginning with
    /// `#` resolve to [`TokenId::Comment`]. Returns `None` for a name the
    /// vocabulary does not know; the text reader logs the warning and
    /// substitutes `Comment`, so resolution as a whole never fails.
    pub fn resolve(name: &str) -> Option<TokenId> {
        if name.starts_with('#') {
            return Some(TokenId::Comment);
        }
        let lowered = name.to_ascii_lowercase();
        if let Some(id) = name_table().get(lowered.as_str()) {
            return Some(*id);
        }
        if lowered == "skip" {
            return Some(TokenId::Comment);
        }
        None
    }
}
