/// Lua script for set-if-not-exists with a lease.
///
/// KEYS\[1\] = the key
/// ARGV\[1\] = value to set
/// ARGV\[2\] = TTL in milliseconds
///
/// Returns 1 if the key was newly set, 0 if it already existed.
pub const SET_IF_NOT_EXISTS: &str = r"
local ok = redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2])
if ok then
    return 1
end
return 0
";

/// Lua script for deleting a key only while it holds an expected value.
///
/// KEYS\[1\] = the key
/// ARGV\[1\] = expected value
///
/// Returns 1 if deleted, 0 if missing or holding another value.
pub const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";
