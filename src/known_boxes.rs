use crate::boxes::FourCC;

/// Human-readable name of a box type, for reports.
///
/// Anything not listed returns `None`; the tree still carries it as raw
/// content.
pub fn full_name(cc: FourCC) -> Option<&'static str> {
    Some(match &cc.0 {
        // file level
        b"ftyp" => "File Type Box",
        b"moov" => "Movie Box",
        b"mdat" => "Media Data Box",
        b"free" => "Free Space Box",
        b"skip" => "Free Space Box",
        b"wide" => "Wide Placeholder",
        b"meta" => "Metadata Box",
        b"sidx" => "Segment Index Box",
        b"styp" => "Segment Type Box",
        b"mfra" => "Movie Fragment Random Access Box",
        b"mfro" => "Movie Fragment Random Access Offset Box",
        b"uuid" => "User Extension Box",
        b"TSCM" => "Screen Recording Extension Box",
        b"DATA" => "Screen Recording Data Box",

        // movie and track structure
        b"mvhd" => "Movie Header Box",
        b"trak" => "Track Box",
        b"udta" => "User Data Box",
        b"tkhd" => "Track Header Box",
        b"tref" => "Track Reference Box",
        b"edts" => "Edit Box",
        b"elst" => "Edit List Box",
        b"mdia" => "Media Box",
        b"mdhd" => "Media Header Box",
        b"hdlr" => "Handler Reference Box",
        b"minf" => "Media Information Box",
        b"vmhd" => "Video Media Header Box",
        b"smhd" => "Sound Media Header Box",
        b"gmhd" => "Base Media Header Box",
        b"nmhd" => "Null Media Header Box",
        b"dinf" => "Data Information Box",
        b"dref" => "Data Reference Box",
        b"url " => "Data Entry URL Box",
        b"alis" => "Data Entry Alias Box",

        // sample table
        b"stbl" => "Sample Table Box",
        b"stsd" => "Sample Description Box",
        b"stts" => "Decoding Time to Sample Box",
        b"ctts" => "Composition Time to Sample Box",
        b"stsc" => "Sample To Chunk Box",
        b"stsz" => "Sample Size Box",
        b"stz2" => "Compact Sample Size Box",
        b"stco" => "Chunk Offset Box",
        b"co64" => "64-bit Chunk Offset Box",
        b"stss" => "Sync Sample Box",
        b"sdtp" => "Independent and Disposable Samples Box",
        b"sgpd" => "Sample Group Description Box",
        b"sbgp" => "Sample To Group Box",

        // fragments
        b"mvex" => "Movie Extends Box",
        b"mehd" => "Movie Extends Header Box",
        b"trex" => "Track Extends Box",
        b"moof" => "Movie Fragment Box",
        b"mfhd" => "Movie Fragment Header Box",
        b"traf" => "Track Fragment Box",
        b"tfhd" => "Track Fragment Header Box",
        b"tfdt" => "Track Fragment Decode Time Box",
        b"trun" => "Track Fragment Run Box",
        b"tfra" => "Track Fragment Random Access Box",

        // protection
        b"sinf" => "Protection Scheme Information Box",
        b"frma" => "Original Format Box",
        b"schm" => "Scheme Type Box",
        b"schi" => "Scheme Information Box",
        b"pssh" => "Protection System Specific Header Box",

        // metadata
        b"ilst" => "Metadata Item List Box",
        b"keys" => "Metadata Item Keys Box",
        b"data" => "Metadata Value Box",
        b"\xa9nam" => "Title",
        b"\xa9ART" => "Artist",
        b"\xa9alb" => "Album",
        b"\xa9day" => "Year",
        b"\xa9too" => "Encoder",
        b"\xa9cmt" => "Comment",
        b"\xa9xyz" => "Location",
        b"trkn" => "Track Number",
        b"covr" => "Cover Art",

        // sample entry extensions
        b"avcC" => "AVC Configuration Box",
        b"hvcC" => "HEVC Configuration Box",
        b"av1C" => "AV1 Configuration Box",
        b"esds" => "Elementary Stream Descriptor Box",
        b"pasp" => "Pixel Aspect Ratio Box",
        b"colr" => "Colour Information Box",
        b"btrt" => "Bit Rate Box",
        b"fiel" => "Field Handling Box",
        b"gama" => "Gamma Level Box",
        b"chan" => "Channel Layout Box",
        b"wave" => "Sound Information Box",

        _ => return None,
    })
}
